// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The dispatcher's output: every frame it hands to the link-layer send (§4.3).

/// One frame the dispatcher wants transmitted, destined for a named interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Complete Ethernet frame bytes, ready for transmission.
    pub frame: Vec<u8>,
    /// Interface to transmit on.
    pub interface: String,
}

impl Action {
    /// Builds a transmit action.
    #[must_use]
    pub fn new(frame: Vec<u8>, interface: impl Into<String>) -> Self {
        Self {
            frame,
            interface: interface.into(),
        }
    }
}
