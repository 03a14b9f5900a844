// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ARP (RFC 826) for Ethernet/IPv4: `HTYPE=1`, `PTYPE=0x0800`, `HLEN=6`, `PLEN=4`.
//! `etherparse` has no ARP support, so this header is parsed and built by hand.

use crate::error::WireError;
use crate::eth::Mac;
use std::net::Ipv4Addr;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const HLEN: u8 = 6;
const PLEN: u8 = 4;

/// An ARP operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    /// `ARPOP_REQUEST` (1).
    Request,
    /// `ARPOP_REPLY` (2).
    Reply,
}

impl ArpOp {
    fn as_u16(self) -> u16 {
        match self {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
        }
    }
}

/// A parsed ARP packet for the Ethernet/IPv4 pairing this router speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// Request or reply.
    pub op: ArpOp,
    /// Sender hardware address.
    pub sender_mac: Mac,
    /// Sender protocol (IPv4) address.
    pub sender_ip: Ipv4Addr,
    /// Target hardware address (all-zero in a request).
    pub target_mac: Mac,
    /// Target protocol (IPv4) address.
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Wire size of an Ethernet/IPv4 ARP packet.
    pub const LEN: usize = 28;

    /// Parses an ARP packet, rejecting anything other than HTYPE=1/PTYPE=0x0800 and
    /// a request/reply opcode.
    pub fn parse(buf: &[u8]) -> Result<ArpPacket, WireError> {
        if buf.len() < Self::LEN {
            return Err(WireError::Truncated {
                needed: Self::LEN,
                have: buf.len(),
            });
        }
        let htype = u16::from_be_bytes([buf[0], buf[1]]);
        let ptype = u16::from_be_bytes([buf[2], buf[3]]);
        let hlen = buf[4];
        let plen = buf[5];
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != HLEN || plen != PLEN {
            return Err(WireError::UnsupportedArpParams);
        }
        let op = match u16::from_be_bytes([buf[6], buf[7]]) {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => return Err(WireError::UnknownArpOp(other)),
        };
        let sender_mac = Mac([buf[8], buf[9], buf[10], buf[11], buf[12], buf[13]]);
        let sender_ip = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
        let target_mac = Mac([buf[18], buf[19], buf[20], buf[21], buf[22], buf[23]]);
        let target_ip = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);
        Ok(ArpPacket {
            op,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    /// Appends the 28-byte wire representation to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        out.extend_from_slice(&PTYPE_IPV4.to_be_bytes());
        out.push(HLEN);
        out.push(PLEN);
        out.extend_from_slice(&self.op.as_u16().to_be_bytes());
        out.extend_from_slice(&self.sender_mac.0);
        out.extend_from_slice(&self.sender_ip.octets());
        out.extend_from_slice(&self.target_mac.0);
        out.extend_from_slice(&self.target_ip.octets());
    }
}
