// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reply builders: ARP request/reply, ICMP echo reply, ICMP error (§4.7).

use net::arp::{ArpOp, ArpPacket};
use net::eth::{EtherType, EthHeader, Mac};
use net::icmp;
use net::ipv4::{self, IpNumber, Ipv4Header};
use routing::Interface;
use std::net::Ipv4Addr;

/// Builds an ARP reply to `request`, answering from `iface` (swaps sender/target
/// at both link and ARP layer, §4.7).
#[must_use]
pub fn arp_reply(iface: &Interface, request: &ArpPacket) -> Vec<u8> {
    let mut frame = Vec::new();
    EthHeader {
        destination: request.sender_mac,
        source: iface.mac(),
        ether_type: EtherType::ARP,
    }
    .write(&mut frame);
    ArpPacket {
        op: ArpOp::Reply,
        sender_mac: iface.mac(),
        sender_ip: iface.ipv4(),
        target_mac: request.sender_mac,
        target_ip: request.sender_ip,
    }
    .write(&mut frame);
    frame
}

/// Builds a broadcast ARP request for `target_ip`, sent from `iface` (§4.7).
#[must_use]
pub fn arp_request(iface: &Interface, target_ip: Ipv4Addr) -> Vec<u8> {
    let mut frame = Vec::new();
    EthHeader {
        destination: Mac::BROADCAST,
        source: iface.mac(),
        ether_type: EtherType::ARP,
    }
    .write(&mut frame);
    ArpPacket {
        op: ArpOp::Request,
        sender_mac: iface.mac(),
        sender_ip: iface.ipv4(),
        target_mac: Mac::ZERO,
        target_ip,
    }
    .write(&mut frame);
    frame
}

/// Turns a received ICMP echo request into its reply, in place: swaps IP
/// src/dst, sets TTL 64, sets ICMP type 0, and recomputes both checksums (§4.7).
/// The caller is responsible for swapping the Ethernet addresses separately.
pub fn icmp_echo_reply_in_place(ip_header: &mut Ipv4Header, icmp_message: &mut [u8]) {
    std::mem::swap(&mut ip_header.source, &mut ip_header.destination);
    ip_header.time_to_live = 64;
    ipv4::fix_checksum(ip_header);
    icmp_message[0] = icmp::TYPE_ECHO_REPLY;
    icmp::fix_checksum(icmp_message);
}

/// Builds a fresh ICMP error frame (type 3 or 11) in response to
/// `offending_ip_packet` (the complete IP datagram, header through payload, that
/// triggered the error), sourced from `reply_iface`'s address (§4.7).
#[must_use]
pub fn icmp_error_ip_packet(
    icmp_type: u8,
    code: u8,
    reply_source: Ipv4Addr,
    destination: Ipv4Addr,
    offending_ip_packet: &[u8],
) -> (Ipv4Header, Vec<u8>) {
    let message = icmp::build_error(icmp_type, code, offending_ip_packet);
    let mut header = Ipv4Header::new(
        u16::try_from(message.len()).unwrap_or(u16::MAX),
        64,
        IpNumber::ICMP,
        reply_source.octets(),
        destination.octets(),
    )
    .expect("icmp error payload length fits in an ip header");
    ipv4::fix_checksum(&mut header);
    (header, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::eth::Mac;

    fn iface() -> Interface {
        Interface::new(
            "eth0",
            Mac([0, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(192, 0, 2, 1),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }

    #[test]
    fn arp_reply_swaps_sender_and_target() {
        let request = ArpPacket {
            op: ArpOp::Request,
            sender_mac: Mac([9, 9, 9, 9, 9, 9]),
            sender_ip: Ipv4Addr::new(192, 0, 2, 50),
            target_mac: Mac::ZERO,
            target_ip: Ipv4Addr::new(192, 0, 2, 1),
        };
        let frame = arp_reply(&iface(), &request);
        let (eth, rest) = EthHeader::parse(&frame).unwrap();
        assert_eq!(eth.destination, request.sender_mac);
        assert_eq!(eth.source, iface().mac());
        let reply = ArpPacket::parse(rest).unwrap();
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.sender_ip, iface().ipv4());
        assert_eq!(reply.target_ip, request.sender_ip);
    }

    #[test]
    fn arp_request_targets_broadcast_with_zero_target_mac() {
        let frame = arp_request(&iface(), Ipv4Addr::new(192, 0, 2, 99));
        let (eth, rest) = EthHeader::parse(&frame).unwrap();
        assert!(eth.destination.is_broadcast());
        let request = ArpPacket::parse(rest).unwrap();
        assert_eq!(request.op, ArpOp::Request);
        assert_eq!(request.target_mac, Mac::ZERO);
        assert_eq!(request.target_ip, Ipv4Addr::new(192, 0, 2, 99));
    }

    #[test]
    fn icmp_error_packet_embeds_offending_header() {
        let offending = [0xABu8; 40];
        let (header, message) = icmp_error_ip_packet(
            icmp::TYPE_DEST_UNREACHABLE,
            icmp::CODE_HOST_UNREACHABLE,
            Ipv4Addr::new(192, 0, 2, 1),
            Ipv4Addr::new(10, 0, 0, 5),
            &offending,
        );
        assert_eq!(ipv4::source(&header), Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(ipv4::destination(&header), Ipv4Addr::new(10, 0, 0, 5));
        assert!(icmp::validate_checksum(&message));
    }
}
