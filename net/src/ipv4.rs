// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 (RFC 791) header parsing and building. Options are not interpreted, only
//! skipped over via the header length field (§4.1).

use crate::error::WireError;
pub use etherparse::{IpNumber, Ipv4Header};
use std::net::Ipv4Addr;

/// Parses and validates an IPv4 header from the front of `buf`.
///
/// Validates the IP version is 4 and that the header checksum matches; either
/// failure is a silent drop at the dispatcher (§4.1, §7). IP options are present in
/// the returned header but never interpreted.
pub fn parse_ipv4(buf: &[u8]) -> Result<(Ipv4Header, &[u8]), WireError> {
    if buf.is_empty() {
        return Err(WireError::Truncated {
            needed: 20,
            have: 0,
        });
    }
    let version = buf[0] >> 4;
    if version != 4 {
        return Err(WireError::UnsupportedIpVersion(version));
    }
    let (header, rest) = Ipv4Header::from_slice(buf).map_err(|_| WireError::Truncated {
        needed: 20,
        have: buf.len(),
    })?;
    if header.calc_header_checksum() != header.header_checksum {
        return Err(WireError::BadIpv4Checksum);
    }
    Ok((header, rest))
}

/// Appends the wire representation of `header` to `out`. The caller is responsible
/// for having called [`fix_checksum`] first if the header was mutated.
pub fn write_ipv4(header: &Ipv4Header, out: &mut Vec<u8>) {
    out.extend_from_slice(&header.to_bytes());
}

/// Recomputes and installs the header checksum, matching the invariant that every
/// header leaving the wire codec is internally consistent.
pub fn fix_checksum(header: &mut Ipv4Header) {
    header.header_checksum = header.calc_header_checksum();
}

/// Decrements TTL by one and recomputes the checksum. Returns `false` (without
/// mutating) if the TTL was already at or below 1, so the caller can emit a time
/// exceeded error instead of forwarding (§4.6).
#[must_use]
pub fn decrement_ttl(header: &mut Ipv4Header) -> bool {
    if header.time_to_live <= 1 {
        return false;
    }
    header.time_to_live -= 1;
    fix_checksum(header);
    true
}

/// Returns the IPv4 source address.
#[must_use]
pub fn source(header: &Ipv4Header) -> Ipv4Addr {
    Ipv4Addr::from(header.source)
}

/// Returns the IPv4 destination address.
#[must_use]
pub fn destination(header: &Ipv4Header) -> Ipv4Addr {
    Ipv4Addr::from(header.destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Ipv4Header {
        let mut header = Ipv4Header::new(
            8,
            64,
            IpNumber::TCP,
            [10, 0, 0, 5],
            [10, 0, 0, 6],
        )
        .expect("valid header");
        fix_checksum(&mut header);
        header
    }

    #[test]
    fn parse_accepts_valid_checksum() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_ipv4(&header, &mut buf);
        buf.extend_from_slice(&[0u8; 8]); // payload
        let (parsed, rest) = parse_ipv4(&buf).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(rest.len(), 8);
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_ipv4(&header, &mut buf);
        buf[10] ^= 0xFF; // corrupt checksum
        assert_eq!(parse_ipv4(&buf), Err(WireError::BadIpv4Checksum));
    }

    #[test]
    fn decrement_ttl_updates_checksum() {
        let mut header = sample_header();
        let before = header.header_checksum;
        assert!(decrement_ttl(&mut header));
        assert_eq!(header.time_to_live, 63);
        assert_ne!(header.header_checksum, before);
        assert_eq!(header.calc_header_checksum(), header.header_checksum);
    }

    #[test]
    fn decrement_ttl_refuses_at_one() {
        let mut header = sample_header();
        header.time_to_live = 1;
        fix_checksum(&mut header);
        assert!(!decrement_ttl(&mut header));
        assert_eq!(header.time_to_live, 1);
    }
}
