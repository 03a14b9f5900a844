// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! TCP (RFC 793) header parsing and building. Options are not processed.

use crate::checksum::tcp_checksum;
use crate::error::WireError;
pub use etherparse::TcpHeader;
use std::net::Ipv4Addr;

/// Parses a TCP header from the front of `buf`.
pub fn parse_tcp(buf: &[u8]) -> Result<(TcpHeader, &[u8]), WireError> {
    TcpHeader::from_slice(buf).map_err(|_| WireError::Truncated {
        needed: 20,
        have: buf.len(),
    })
}

/// Appends the wire representation of `header` to `out`.
pub fn write_tcp(header: &TcpHeader, out: &mut Vec<u8>) {
    out.extend_from_slice(&header.to_bytes());
}

/// Returns whether this is a bare SYN (SYN set, ACK clear) — the segment that opens
/// a new outbound or unsolicited-inbound connection (§4.5).
#[must_use]
pub fn is_bare_syn(header: &TcpHeader) -> bool {
    header.syn && !header.ack
}

/// Returns whether this is a SYN+ACK — the second leg of the handshake (§4.5).
#[must_use]
pub fn is_syn_ack(header: &TcpHeader) -> bool {
    header.syn && header.ack
}

/// Returns whether this is a pure ACK carrying no SYN/FIN/RST flags (§4.5).
#[must_use]
pub fn is_pure_ack(header: &TcpHeader) -> bool {
    header.ack && !header.syn && !header.fin && !header.rst
}

/// Recomputes and installs the TCP checksum over the pseudo-header built from
/// `src`/`dst` and the segment `header` + `payload` (§4.1).
pub fn fix_checksum(header: &mut TcpHeader, src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) {
    header.checksum = 0;
    let mut segment = header.to_bytes().to_vec();
    segment.extend_from_slice(payload);
    header.checksum = tcp_checksum(src, dst, &segment);
}
