// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors produced while parsing wire formats.
//!
//! All of these cause the dispatcher to drop the frame silently (§4.1, §7): a
//! malformed frame is never itself worth an ICMP error, since we cannot trust its
//! contents enough to build one.

/// Failure parsing or validating a frame or header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer is too short to contain the header being parsed.
    #[error("buffer too short: need {needed} bytes, have {have}")]
    Truncated {
        /// Minimum number of bytes required.
        needed: usize,
        /// Number of bytes actually available.
        have: usize,
    },
    /// The IP version field is not 4.
    #[error("unsupported IP version {0}")]
    UnsupportedIpVersion(u8),
    /// The IPv4 header checksum does not match the computed checksum.
    #[error("bad IPv4 header checksum")]
    BadIpv4Checksum,
    /// The ARP hardware/protocol parameters are not Ethernet/IPv4.
    #[error("unsupported ARP parameters")]
    UnsupportedArpParams,
    /// The ARP operation code is neither request (1) nor reply (2).
    #[error("unknown ARP opcode {0}")]
    UnknownArpOp(u16),
    /// The ICMP type is not one this router handles.
    #[error("unhandled ICMP type {0}")]
    UnhandledIcmpType(u8),
}
