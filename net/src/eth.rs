// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet II framing: the [`Mac`] address type and the 14-byte header.

use crate::error::WireError;
use etherparse::Ethernet2Header;
use std::fmt::{self, Display, Formatter};

pub use etherparse::EtherType;

/// A 6-byte hardware (MAC) address.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: Mac = Mac([0xff; 6]);
    /// The all-zero address, used as the unresolved target in an ARP request.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns whether this is the link-layer broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

/// Errors converting a string to a [`Mac`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address string: {0}")]
pub struct MacParseError(String);

impl std::str::FromStr for Mac {
    type Err = MacParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = value.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| MacParseError(value.to_owned()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| MacParseError(value.to_owned()))?;
        }
        if parts.next().is_some() {
            return Err(MacParseError(value.to_owned()));
        }
        Ok(Mac(octets))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A parsed Ethernet II header: destination, source, and EtherType.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHeader {
    /// Destination hardware address.
    pub destination: Mac,
    /// Source hardware address.
    pub source: Mac,
    /// EtherType of the payload (e.g. ARP, IPv4).
    pub ether_type: EtherType,
}

impl EthHeader {
    /// Size in bytes of an (untagged) Ethernet II header.
    pub const LEN: usize = 14;

    /// Parses the 14-byte header from the front of `buf`, returning the header and
    /// the remaining payload.
    pub fn parse(buf: &[u8]) -> Result<(EthHeader, &[u8]), WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                needed: Self::LEN,
                have: buf.len(),
            });
        }
        let (raw, rest) = Ethernet2Header::from_slice(buf).map_err(|_| WireError::Truncated {
            needed: Self::LEN,
            have: buf.len(),
        })?;
        Ok((
            EthHeader {
                destination: Mac(raw.destination),
                source: Mac(raw.source),
                ether_type: raw.ether_type,
            },
            rest,
        ))
    }

    /// Appends the 14-byte wire representation of this header to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        let raw = Ethernet2Header {
            destination: self.destination.0,
            source: self.source.0,
            ether_type: self.ether_type,
        };
        out.extend_from_slice(&raw.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display_and_parse_round_trip() {
        let mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let text = mac.to_string();
        assert_eq!(text, "aa:bb:cc:dd:ee:ff");
        assert_eq!(text.parse::<Mac>().unwrap(), mac);
    }

    #[test]
    fn eth_header_round_trips() {
        let header = EthHeader {
            destination: Mac::BROADCAST,
            source: Mac([1, 2, 3, 4, 5, 6]),
            ether_type: EtherType::ARP,
        };
        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), EthHeader::LEN);
        let (parsed, rest) = EthHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn eth_header_parse_rejects_truncated_input() {
        let buf = [0u8; 10];
        assert!(matches!(
            EthHeader::parse(&buf),
            Err(WireError::Truncated { .. })
        ));
    }
}
