// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configurable sweeper timeouts (§4.5).

use std::time::Duration;

/// The four timeouts governing when the sweeper frees NAT state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatTimeouts {
    /// How long an ICMP-query mapping may sit idle before expiry.
    pub icmp_query_idle: Duration,
    /// How long an established TCP connection may sit idle before expiry.
    pub tcp_established_idle: Duration,
    /// How long a not-yet-established TCP connection may sit idle before expiry.
    pub tcp_transitory: Duration,
    /// How long an unsolicited inbound SYN is held awaiting a matching outbound SYN.
    pub unsolicited_syn_hold: Duration,
}

impl Default for NatTimeouts {
    /// The defaults given in §4.5.
    fn default() -> Self {
        Self {
            icmp_query_idle: Duration::from_secs(60),
            tcp_established_idle: Duration::from_secs(7440),
            tcp_transitory: Duration::from_secs(300),
            unsolicited_syn_hold: Duration::from_secs(6),
        }
    }
}
