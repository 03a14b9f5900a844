// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ICMPv4 (RFC 792): echo request/reply, and the type-3/type-11 error format
//! (8-byte header + 28 bytes of offending-packet context). `etherparse`'s ICMP
//! support doesn't cover the error-message embedding this router needs, so these
//! are parsed and built directly from the wire layout.

use crate::checksum::internet_checksum;
use crate::error::WireError;

/// Number of bytes of the offending IP packet echoed back in an ICMP error: the
/// 20-byte (no-options) IP header plus the first 8 bytes of its payload (§4.7).
pub const ERROR_ECHO_LEN: usize = 28;

/// ICMP echo request type.
pub const TYPE_ECHO_REQUEST: u8 = 8;
/// ICMP echo reply type.
pub const TYPE_ECHO_REPLY: u8 = 0;
/// ICMP destination unreachable type.
pub const TYPE_DEST_UNREACHABLE: u8 = 3;
/// ICMP time exceeded type.
pub const TYPE_TIME_EXCEEDED: u8 = 11;

/// Destination unreachable code: network unreachable (no route).
pub const CODE_NET_UNREACHABLE: u8 = 0;
/// Destination unreachable code: host unreachable (ARP resolution failed).
pub const CODE_HOST_UNREACHABLE: u8 = 1;
/// Destination unreachable code: port unreachable (TCP/UDP to a router address).
pub const CODE_PORT_UNREACHABLE: u8 = 3;
/// Time exceeded code: TTL exceeded in transit.
pub const CODE_TTL_EXCEEDED: u8 = 0;

/// ICMP types that are themselves error reports; we never generate an ICMP error in
/// response to one of these, to avoid error amplification (§4.4, §7).
const ERROR_TYPES: [u8; 5] = [3, 4, 5, 11, 12];

/// Returns whether `icmp_type` identifies an ICMP error message.
#[must_use]
pub fn is_error_type(icmp_type: u8) -> bool {
    ERROR_TYPES.contains(&icmp_type)
}

/// A parsed ICMP echo request/reply header (type, code, checksum, identifier,
/// sequence number) plus whatever payload follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpEcho {
    /// `TYPE_ECHO_REQUEST` or `TYPE_ECHO_REPLY`.
    pub icmp_type: u8,
    /// Echo identifier, opaque to the router except when rewritten by NAT.
    pub identifier: u16,
    /// Echo sequence number.
    pub sequence: u16,
}

impl IcmpEcho {
    /// Size of the echo header (type, code, checksum, id, seq).
    pub const HEADER_LEN: usize = 8;

    /// Parses an echo request/reply header from the front of `buf`.
    pub fn parse(buf: &[u8]) -> Result<(IcmpEcho, &[u8]), WireError> {
        if buf.len() < Self::HEADER_LEN {
            return Err(WireError::Truncated {
                needed: Self::HEADER_LEN,
                have: buf.len(),
            });
        }
        let icmp_type = buf[0];
        if icmp_type != TYPE_ECHO_REQUEST && icmp_type != TYPE_ECHO_REPLY {
            return Err(WireError::UnhandledIcmpType(icmp_type));
        }
        let identifier = u16::from_be_bytes([buf[4], buf[5]]);
        let sequence = u16::from_be_bytes([buf[6], buf[7]]);
        Ok((
            IcmpEcho {
                icmp_type,
                identifier,
                sequence,
            },
            &buf[Self::HEADER_LEN..],
        ))
    }
}

/// Validates the ICMP checksum of a complete ICMP message (header + payload).
#[must_use]
pub fn validate_checksum(message: &[u8]) -> bool {
    internet_checksum(message) == 0
}

/// Recomputes and installs the checksum (bytes 2..4) of a complete, in-place ICMP
/// message.
pub fn fix_checksum(message: &mut [u8]) {
    message[2] = 0;
    message[3] = 0;
    let csum = internet_checksum(message);
    message[2..4].copy_from_slice(&csum.to_be_bytes());
}

/// Builds a type-3 (destination unreachable) or type-11 (time exceeded) ICMP error
/// message: the fixed 8-byte header (type, code, checksum, 4 bytes unused) followed
/// by [`ERROR_ECHO_LEN`] bytes copied from the offending IP packet (§4.7).
///
/// `offending_ip_packet` must start at the IP header; if shorter than
/// [`ERROR_ECHO_LEN`] it is zero-padded, matching a packet whose payload was itself
/// truncated.
#[must_use]
pub fn build_error(icmp_type: u8, code: u8, offending_ip_packet: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(8 + ERROR_ECHO_LEN);
    message.push(icmp_type);
    message.push(code);
    message.extend_from_slice(&[0, 0]); // checksum, filled in below
    message.extend_from_slice(&[0, 0, 0, 0]); // unused
    let take = offending_ip_packet.len().min(ERROR_ECHO_LEN);
    message.extend_from_slice(&offending_ip_packet[..take]);
    message.resize(8 + ERROR_ECHO_LEN, 0);
    fix_checksum(&mut message);
    message
}
