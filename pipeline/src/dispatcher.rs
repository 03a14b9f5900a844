// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The top-level packet dispatcher (§4.3): classifies every received frame
//! and drives the ARP cache, NAT engine, and forwarding path to a set of
//! actions for the link layer to transmit.

use crate::action::Action;
use crate::forward::Forwarder;
use crate::reply;
use arp::ArpCache;
use nat::{NatEngine, NatKind, TcpQuad};
use net::arp::{ArpOp, ArpPacket};
use net::eth::{EtherType, EthHeader};
use net::icmp::{self, IcmpEcho};
use net::ipv4::{self, IpNumber, Ipv4Header};
use net::tcp;
use routing::{InterfaceTable, RoutingTable};
use std::time::Instant;
use tracing::{trace, warn};

/// Largest Ethernet frame this router accepts (§4.3 step 1).
const MAX_FRAME_LEN: usize = 1514;

/// Wires together the interface/route/ARP/NAT state and exposes the single
/// `dispatch` entrypoint every per-interface thread drives (§5).
pub struct Dispatcher {
    interfaces: InterfaceTable,
    routes: RoutingTable,
    arp: ArpCache,
    nat: NatEngine,
    nat_enabled: bool,
    internal_interface: String,
    external_interface: String,
}

impl Dispatcher {
    /// Builds a dispatcher over a fixed interface set, static routes, and NAT
    /// configuration. The NAT engine always exists (§4.5); `nat_enabled` only
    /// gates whether the dispatcher's NAT paths are taken.
    #[must_use]
    pub fn new(
        interfaces: InterfaceTable,
        routes: RoutingTable,
        arp: ArpCache,
        nat: NatEngine,
        nat_enabled: bool,
        internal_interface: impl Into<String>,
        external_interface: impl Into<String>,
    ) -> Self {
        Self {
            interfaces,
            routes,
            arp,
            nat,
            nat_enabled,
            internal_interface: internal_interface.into(),
            external_interface: external_interface.into(),
        }
    }

    /// This dispatcher's ARP cache, shared with the ARP sweeper thread.
    #[must_use]
    pub fn arp_cache(&self) -> &ArpCache {
        &self.arp
    }

    /// This dispatcher's NAT engine, shared with the NAT sweeper thread.
    #[must_use]
    pub fn nat_engine(&self) -> &NatEngine {
        &self.nat
    }

    /// The interface table, for drivers that need to enumerate interfaces
    /// outside of packet processing (e.g. the bootstrap that spawns one
    /// receive thread per interface).
    #[must_use]
    pub fn interfaces(&self) -> &InterfaceTable {
        &self.interfaces
    }

    fn forwarder(&self) -> Forwarder<'_> {
        Forwarder::new(&self.interfaces, &self.routes, &self.arp)
    }

    /// Converts a completed ARP sweep pass into actions (broadcasts plus
    /// host-unreachable for exhausted requests). Called by the ARP sweeper
    /// thread once per second (§4.4, §5).
    #[must_use]
    pub fn handle_arp_sweep(&self) -> Vec<Action> {
        self.forwarder().effects_to_actions(self.arp.sweep_and_retry())
    }

    /// Converts a completed NAT sweep pass into actions (port-unreachable for
    /// timed-out unsolicited SYNs). Called by the NAT sweeper thread once per
    /// second (§4.5, §5).
    #[must_use]
    pub fn handle_nat_sweep(&self) -> Vec<Action> {
        let forwarder = self.forwarder();
        let mut actions = Vec::new();
        for effect in self.nat.sweep() {
            let nat::NatSweepEffect::UnsolicitedSynUnmatched { frame } = effect;
            actions.extend(self.reject_frame(&forwarder, &frame, icmp::TYPE_DEST_UNREACHABLE, icmp::CODE_PORT_UNREACHABLE));
        }
        actions
    }

    /// The §4.3 decision tree entrypoint: classifies one received frame and
    /// returns every action it provokes.
    #[must_use]
    pub fn dispatch(&self, frame: &[u8], interface_name: &str) -> Vec<Action> {
        if frame.len() > MAX_FRAME_LEN || frame.len() < EthHeader::LEN {
            trace!(len = frame.len(), "dropping oversized/undersized frame");
            return Vec::new();
        }
        let Ok((eth, rest)) = EthHeader::parse(frame) else {
            return Vec::new();
        };
        let Some(receiving) = self.interfaces.get(interface_name) else {
            warn!(interface_name, "frame received on unknown interface");
            return Vec::new();
        };

        match eth.ether_type {
            EtherType::ARP => self.dispatch_arp(rest, &receiving),
            EtherType::IPV4 => self.dispatch_ipv4(rest, &receiving, eth.source),
            other => {
                trace!(?other, "dropping unhandled ethertype");
                Vec::new()
            }
        }
    }

    fn dispatch_arp(&self, rest: &[u8], receiving: &routing::Interface) -> Vec<Action> {
        let Ok(packet) = ArpPacket::parse(rest) else {
            return Vec::new();
        };
        match packet.op {
            ArpOp::Request if packet.target_ip == receiving.ipv4() => {
                vec![Action::new(reply::arp_reply(receiving, &packet), receiving.name())]
            }
            ArpOp::Request => Vec::new(),
            ArpOp::Reply => {
                let Some(request) = self.arp.insert(packet.sender_ip, packet.sender_mac) else {
                    return Vec::new();
                };
                self.forwarder().redrive(&request)
            }
        }
    }

    fn dispatch_ipv4(&self, rest: &[u8], receiving: &routing::Interface, sender_mac: net::eth::Mac) -> Vec<Action> {
        let Ok((ip_header, payload)) = ipv4::parse_ipv4(rest) else {
            return Vec::new();
        };
        let destination = ipv4::destination(&ip_header);

        if self.interfaces.is_local(destination) {
            return self.dispatch_local(ip_header, payload, receiving, sender_mac);
        }

        let forwarder = self.forwarder();
        if ip_header.time_to_live <= 1 {
            return forwarder.reject(icmp::TYPE_TIME_EXCEEDED, icmp::CODE_TTL_EXCEEDED, &ip_header, payload);
        }

        if self.nat_enabled && receiving.name() == self.internal_interface {
            return self.dispatch_nat_outbound(ip_header, payload);
        }

        forwarder.forward(ip_header, payload)
    }

    fn dispatch_local(&self, ip_header: Ipv4Header, payload: &[u8], receiving: &routing::Interface, sender_mac: net::eth::Mac) -> Vec<Action> {
        let destination = ipv4::destination(&ip_header);
        let external = self.interfaces.get(&self.external_interface);
        if self.nat_enabled && external.is_some_and(|iface| iface.ipv4() == destination) {
            return self.dispatch_nat_inbound(ip_header, payload);
        }

        match ip_header.protocol {
            IpNumber::ICMP => self.dispatch_icmp_local(ip_header, payload, receiving, sender_mac),
            IpNumber::TCP | IpNumber::UDP => self
                .forwarder()
                .reject(icmp::TYPE_DEST_UNREACHABLE, icmp::CODE_PORT_UNREACHABLE, &ip_header, payload),
            _ => Vec::new(),
        }
    }

    /// Replies to an echo request addressed to the router itself: built
    /// directly out to the ingress interface, no ARP lookup needed since the
    /// sender's hardware address is already known from the received frame
    /// (§4.7).
    fn dispatch_icmp_local(
        &self,
        mut ip_header: Ipv4Header,
        payload: &[u8],
        receiving: &routing::Interface,
        sender_mac: net::eth::Mac,
    ) -> Vec<Action> {
        let Ok((echo, _)) = IcmpEcho::parse(payload) else {
            return Vec::new();
        };
        if echo.icmp_type != icmp::TYPE_ECHO_REQUEST || !icmp::validate_checksum(payload) {
            return Vec::new();
        }
        let mut message = payload.to_vec();
        reply::icmp_echo_reply_in_place(&mut ip_header, &mut message);

        let mut frame = Vec::new();
        EthHeader {
            destination: sender_mac,
            source: receiving.mac(),
            ether_type: EtherType::IPV4,
        }
        .write(&mut frame);
        ipv4::write_ipv4(&ip_header, &mut frame);
        frame.extend_from_slice(&message);
        vec![Action::new(frame, receiving.name())]
    }

    fn dispatch_nat_outbound(&self, mut ip_header: Ipv4Header, payload: &[u8]) -> Vec<Action> {
        let Some(external) = self.interfaces.get(&self.external_interface) else {
            return Vec::new();
        };
        let internal_ip = ipv4::source(&ip_header);
        let now = Instant::now();

        match ip_header.protocol {
            IpNumber::ICMP => {
                let Ok((echo, _)) = IcmpEcho::parse(payload) else {
                    return self.forwarder().forward(ip_header, payload);
                };
                if echo.icmp_type != icmp::TYPE_ECHO_REQUEST {
                    return self.forwarder().forward(ip_header, payload);
                }
                let Some(mapping) = self.nat.outbound_icmp_query(internal_ip, external.ipv4(), echo.identifier, now) else {
                    return Vec::new();
                };
                let mut message = payload.to_vec();
                message[4..6].copy_from_slice(&mapping.external_aux().to_be_bytes());
                icmp::fix_checksum(&mut message);
                ip_header.source = external.ipv4().octets();
                ipv4::fix_checksum(&mut ip_header);
                self.forwarder().forward(ip_header, &message)
            }
            IpNumber::TCP => {
                let Ok((tcp_header, tcp_payload)) = tcp::parse_tcp(payload) else {
                    return Vec::new();
                };
                let quad = TcpQuad {
                    src_ip: internal_ip,
                    src_port: tcp_header.source_port,
                    dst_ip: ipv4::destination(&ip_header),
                    dst_port: tcp_header.destination_port,
                };
                let Some(mapping) = self.nat.outbound_tcp(
                    internal_ip,
                    external.ipv4(),
                    quad,
                    tcp_header.syn,
                    tcp_header.ack,
                    tcp_header.sequence_number,
                    tcp_header.acknowledgment_number,
                    now,
                ) else {
                    return Vec::new();
                };

                let mut rewritten = tcp_header;
                rewritten.source_port = mapping.external_aux();
                ip_header.source = external.ipv4().octets();
                ipv4::fix_checksum(&mut ip_header);
                tcp::fix_checksum(&mut rewritten, external.ipv4(), quad.dst_ip, tcp_payload);

                let mut message = Vec::new();
                tcp::write_tcp(&rewritten, &mut message);
                message.extend_from_slice(tcp_payload);
                self.forwarder().forward(ip_header, &message)
            }
            _ => self.forwarder().forward(ip_header, payload),
        }
    }

    fn dispatch_nat_inbound(&self, mut ip_header: Ipv4Header, payload: &[u8]) -> Vec<Action> {
        let now = Instant::now();
        match ip_header.protocol {
            IpNumber::ICMP => {
                let Ok((echo, _)) = IcmpEcho::parse(payload) else {
                    return Vec::new();
                };
                let Some(mapping) = self.nat.inbound_icmp_query(echo.identifier, now) else {
                    return Vec::new();
                };
                let mut message = payload.to_vec();
                message[4..6].copy_from_slice(&mapping.internal_aux().to_be_bytes());
                icmp::fix_checksum(&mut message);
                ip_header.destination = mapping.internal_ip().octets();
                ipv4::fix_checksum(&mut ip_header);
                self.forwarder().forward(ip_header, &message)
            }
            IpNumber::TCP => self.dispatch_nat_inbound_tcp(ip_header, payload, now),
            _ => Vec::new(),
        }
    }

    fn dispatch_nat_inbound_tcp(&self, mut ip_header: Ipv4Header, payload: &[u8], now: Instant) -> Vec<Action> {
        let Ok((tcp_header, tcp_payload)) = tcp::parse_tcp(payload) else {
            return Vec::new();
        };
        let external_port = tcp_header.destination_port;
        let Some(mapping) = self.nat.lookup_external(NatKind::Tcp, external_port) else {
            let frame = self.reconstruct_frame(&ip_header, payload);
            let outcome = self.nat.inbound_tcp_unmapped(external_port, tcp_header.syn, tcp_header.ack, frame, now);
            trace!(external_port, ?outcome, "inbound tcp with no external mapping");
            return Vec::new();
        };

        let quad = TcpQuad {
            src_ip: mapping.internal_ip(),
            src_port: mapping.internal_aux(),
            dst_ip: ipv4::source(&ip_header),
            dst_port: tcp_header.source_port,
        };
        let mapping = self
            .nat
            .inbound_tcp(
                external_port,
                quad,
                tcp_header.syn,
                tcp_header.ack,
                tcp_header.sequence_number,
                tcp_header.acknowledgment_number,
                now,
            )
            .unwrap_or(mapping);

        let mut rewritten = tcp_header;
        rewritten.destination_port = mapping.internal_aux();
        ip_header.destination = mapping.internal_ip().octets();
        ipv4::fix_checksum(&mut ip_header);
        tcp::fix_checksum(&mut rewritten, quad.dst_ip, mapping.internal_ip(), tcp_payload);

        let mut message = Vec::new();
        tcp::write_tcp(&rewritten, &mut message);
        message.extend_from_slice(tcp_payload);
        self.forwarder().forward(ip_header, &message)
    }

    fn reconstruct_frame(&self, ip_header: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        ipv4::write_ipv4(ip_header, &mut frame);
        frame.extend_from_slice(payload);
        frame
    }

    fn reject_frame(&self, forwarder: &Forwarder<'_>, frame: &[u8], icmp_type: u8, code: u8) -> Vec<Action> {
        let Ok((ip_header, payload)) = ipv4::parse_ipv4(frame) else {
            return Vec::new();
        };
        forwarder.reject(icmp_type, code, &ip_header, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nat::{ConnState, NatTimeouts};
    use net::eth::Mac;
    use net::ipv4::Ipv4Header;
    use routing::{Interface, Route};
    use std::net::Ipv4Addr;
    use tracing_test::traced_test;

    fn iface(name: &str, mac: [u8; 6], ip: &str) -> Interface {
        Interface::new(name, Mac(mac), ip.parse().unwrap(), Ipv4Addr::new(255, 255, 255, 0))
    }

    fn eth_ipv4_frame(dst_mac: Mac, src_mac: Mac, ip_header: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        EthHeader {
            destination: dst_mac,
            source: src_mac,
            ether_type: EtherType::IPV4,
        }
        .write(&mut frame);
        ipv4::write_ipv4(ip_header, &mut frame);
        frame.extend_from_slice(payload);
        frame
    }

    fn icmp_echo_request(id: u16, seq: u16) -> Vec<u8> {
        let mut message = vec![icmp::TYPE_ECHO_REQUEST, 0, 0, 0];
        message.extend_from_slice(&id.to_be_bytes());
        message.extend_from_slice(&seq.to_be_bytes());
        icmp::fix_checksum(&mut message);
        message
    }

    fn ip_header(src: &str, dst: &str, ttl: u8, protocol: IpNumber, payload_len: u16) -> Ipv4Header {
        let mut header = Ipv4Header::new(
            payload_len,
            ttl,
            protocol,
            src.parse::<Ipv4Addr>().unwrap().octets(),
            dst.parse::<Ipv4Addr>().unwrap().octets(),
        )
        .unwrap();
        ipv4::fix_checksum(&mut header);
        header
    }

    fn tcp_segment(src_port: u16, dst_port: u16, seq: u32, ack: u32, syn: bool, ack_flag: bool, src: &str, dst: &str) -> (tcp::TcpHeader, Vec<u8>) {
        let mut header = tcp::TcpHeader::new(src_port, dst_port, seq, 4096);
        header.syn = syn;
        header.ack = ack_flag;
        header.acknowledgment_number = ack;
        tcp::fix_checksum(&mut header, src.parse().unwrap(), dst.parse().unwrap(), &[]);
        let mut bytes = Vec::new();
        tcp::write_tcp(&header, &mut bytes);
        (header, bytes)
    }

    /// Scenario 1 (§8): echo request to the router's own interface produces a
    /// correctly addressed, correctly checksummed echo reply.
    #[test]
    #[traced_test]
    fn echo_request_to_router_interface_replies() {
        let mut interfaces = InterfaceTable::new();
        interfaces.add(iface("eth0", [0, 0, 0, 0, 0, 1], "192.0.2.1"));
        let dispatcher = Dispatcher::new(
            interfaces,
            RoutingTable::new(),
            ArpCache::new(),
            NatEngine::new(NatTimeouts::default()),
            false,
            "internal",
            "external",
        );

        let sender_mac = Mac([0xaa, 0, 0, 0, 0, 2]);
        let echo = icmp_echo_request(7, 1);
        let header = ip_header("10.0.0.5", "192.0.2.1", 64, IpNumber::ICMP, echo.len() as u16);
        let frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), sender_mac, &header, &echo);

        let actions = dispatcher.dispatch(&frame, "eth0");
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.interface, "eth0");

        let (eth, rest) = EthHeader::parse(&action.frame).unwrap();
        assert_eq!(eth.destination, sender_mac);
        let (reply_header, reply_payload) = ipv4::parse_ipv4(rest).unwrap();
        assert_eq!(ipv4::source(&reply_header), "192.0.2.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(ipv4::destination(&reply_header), "10.0.0.5".parse::<Ipv4Addr>().unwrap());
        assert_eq!(reply_header.time_to_live, 64);
        assert_eq!(reply_payload[0], icmp::TYPE_ECHO_REPLY);
        assert!(icmp::validate_checksum(reply_payload));
    }

    /// Scenario 2 (§8): a cached ARP entry lets forwarding send immediately
    /// with TTL decremented and Ethernet re-addressed to the next hop.
    #[test]
    fn forward_with_cached_arp_decrements_ttl_and_readdresses() {
        let mut interfaces = InterfaceTable::new();
        interfaces.add(iface("eth0", [0, 0, 0, 0, 0, 1], "192.0.2.1"));
        interfaces.add(iface("eth1", [0, 0, 0, 0, 0, 2], "10.1.0.2"));
        let mut routes = RoutingTable::new();
        routes.add(Route {
            destination: "10.1.0.0".parse().unwrap(),
            gateway: "10.1.0.1".parse().unwrap(),
            mask: "255.255.0.0".parse().unwrap(),
            interface: "eth1".to_owned(),
        });
        let arp = ArpCache::new();
        arp.insert("10.1.0.1".parse().unwrap(), Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));

        let dispatcher = Dispatcher::new(interfaces, routes, arp, NatEngine::new(NatTimeouts::default()), false, "internal", "external");

        let (_, tcp_bytes) = tcp_segment(40000, 80, 1, 0, false, true, "192.0.2.50", "10.1.5.5");
        let header = ip_header("192.0.2.50", "10.1.5.5", 10, IpNumber::TCP, tcp_bytes.len() as u16);
        let frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), Mac([9; 6]), &header, &tcp_bytes);

        let actions = dispatcher.dispatch(&frame, "eth0");
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.interface, "eth1");

        let (eth, rest) = EthHeader::parse(&action.frame).unwrap();
        assert_eq!(eth.destination, Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(eth.source, Mac([0, 0, 0, 0, 0, 2]));
        let (out_header, _) = ipv4::parse_ipv4(rest).unwrap();
        assert_eq!(out_header.time_to_live, 9);
        assert_eq!(out_header.calc_header_checksum(), out_header.header_checksum);
    }

    /// Scenario 3 (§8), abbreviated: an ARP cache miss queues the frame and
    /// fires the first broadcast immediately rather than forwarding it.
    #[test]
    fn forward_with_cold_arp_queues_and_broadcasts() {
        let mut interfaces = InterfaceTable::new();
        interfaces.add(iface("eth0", [0, 0, 0, 0, 0, 1], "192.0.2.1"));
        interfaces.add(iface("eth1", [0, 0, 0, 0, 0, 2], "10.1.0.2"));
        let mut routes = RoutingTable::new();
        routes.add(Route {
            destination: "10.1.0.0".parse().unwrap(),
            gateway: "10.1.0.1".parse().unwrap(),
            mask: "255.255.0.0".parse().unwrap(),
            interface: "eth1".to_owned(),
        });
        let dispatcher = Dispatcher::new(
            interfaces,
            routes,
            ArpCache::new(),
            NatEngine::new(NatTimeouts::default()),
            false,
            "internal",
            "external",
        );

        let (_, tcp_bytes) = tcp_segment(40000, 80, 1, 0, false, true, "192.0.2.50", "10.1.5.5");
        let header = ip_header("192.0.2.50", "10.1.5.5", 10, IpNumber::TCP, tcp_bytes.len() as u16);
        let frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), Mac([9; 6]), &header, &tcp_bytes);

        let actions = dispatcher.dispatch(&frame, "eth0");
        assert_eq!(actions.len(), 1, "first broadcast fires immediately on cache miss");
        let (eth, rest) = EthHeader::parse(&actions[0].frame).unwrap();
        assert_eq!(eth.ether_type, EtherType::ARP);
        let arp_request = ArpPacket::parse(rest).unwrap();
        assert_eq!(arp_request.target_ip, "10.1.0.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(dispatcher.arp_cache().lookup("10.1.0.1".parse().unwrap()), None);
    }

    fn nat_dispatcher() -> (Dispatcher, RoutingTable) {
        let mut interfaces = InterfaceTable::new();
        interfaces.add(iface("internal", [0, 0, 0, 0, 0, 1], "10.0.0.1"));
        interfaces.add(iface("external", [0, 0, 0, 0, 0, 2], "203.0.113.1"));
        let mut routes = RoutingTable::new();
        routes.add(Route {
            destination: "0.0.0.0".parse().unwrap(),
            gateway: "203.0.113.254".parse().unwrap(),
            mask: "0.0.0.0".parse().unwrap(),
            interface: "external".to_owned(),
        });
        routes.add(Route {
            destination: "10.0.0.0".parse().unwrap(),
            gateway: "0.0.0.0".parse().unwrap(),
            mask: "255.255.255.0".parse().unwrap(),
            interface: "internal".to_owned(),
        });
        let arp = ArpCache::new();
        arp.insert("203.0.113.254".parse().unwrap(), Mac([1, 1, 1, 1, 1, 1]));
        arp.insert("10.0.0.5".parse().unwrap(), Mac([2, 2, 2, 2, 2, 2]));
        let dispatcher = Dispatcher::new(interfaces, routes.clone(), arp, NatEngine::new(NatTimeouts::default()), true, "internal", "external");
        (dispatcher, routes)
    }

    /// Scenario 4 (§8): an outbound SYN on the internal interface allocates a
    /// mapping from 1024 and is rewritten onto the external address.
    #[test]
    #[traced_test]
    fn nat_outbound_syn_allocates_mapping_and_rewrites() {
        let (dispatcher, _) = nat_dispatcher();

        let (_, tcp_bytes) = tcp_segment(40000, 80, 1000, 0, true, false, "10.0.0.5", "93.184.216.34");
        let header = ip_header("10.0.0.5", "93.184.216.34", 64, IpNumber::TCP, tcp_bytes.len() as u16);
        let frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), Mac([2, 2, 2, 2, 2, 2]), &header, &tcp_bytes);

        let actions = dispatcher.dispatch(&frame, "internal");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].interface, "external");

        let (_, rest) = EthHeader::parse(&actions[0].frame).unwrap();
        let (out_header, out_payload) = ipv4::parse_ipv4(rest).unwrap();
        assert_eq!(ipv4::source(&out_header), "203.0.113.1".parse::<Ipv4Addr>().unwrap());
        let (out_tcp, _) = tcp::parse_tcp(out_payload).unwrap();
        assert_eq!(out_tcp.source_port, 1024);
        assert!(out_tcp.syn);

        let key = nat::InternalKey {
            kind: NatKind::Tcp,
            internal_ip: "10.0.0.5".parse().unwrap(),
            internal_aux: 40000,
        };
        let mapping = dispatcher.nat_engine().lookup_internal(key).unwrap();
        assert_eq!(mapping.external_aux(), 1024);
        let quad = TcpQuad {
            src_ip: "10.0.0.5".parse().unwrap(),
            src_port: 40000,
            dst_ip: "93.184.216.34".parse().unwrap(),
            dst_port: 80,
        };
        assert_eq!(mapping.connection(quad).unwrap().state(), ConnState::SynSent);
    }

    /// Scenario 5 (§8): the inbound SYN+ACK advances the connection and is
    /// delivered back to the internal host; a subsequent outbound ACK reaches
    /// ESTABLISHED.
    #[test]
    fn nat_inbound_synack_completes_handshake() {
        let (dispatcher, _) = nat_dispatcher();

        let (_, syn_bytes) = tcp_segment(40000, 80, 1000, 0, true, false, "10.0.0.5", "93.184.216.34");
        let syn_header = ip_header("10.0.0.5", "93.184.216.34", 64, IpNumber::TCP, syn_bytes.len() as u16);
        let syn_frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), Mac([2, 2, 2, 2, 2, 2]), &syn_header, &syn_bytes);
        dispatcher.dispatch(&syn_frame, "internal");

        let (_, synack_bytes) = tcp_segment(80, 1024, 5000, 1001, true, true, "93.184.216.34", "203.0.113.1");
        let synack_header = ip_header("93.184.216.34", "203.0.113.1", 64, IpNumber::TCP, synack_bytes.len() as u16);
        let synack_frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 2]), Mac([3; 6]), &synack_header, &synack_bytes);

        let actions = dispatcher.dispatch(&synack_frame, "external");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].interface, "internal");
        let (_, rest) = EthHeader::parse(&actions[0].frame).unwrap();
        let (delivered_header, delivered_payload) = ipv4::parse_ipv4(rest).unwrap();
        assert_eq!(ipv4::destination(&delivered_header), "10.0.0.5".parse::<Ipv4Addr>().unwrap());
        let (delivered_tcp, _) = tcp::parse_tcp(delivered_payload).unwrap();
        assert_eq!(delivered_tcp.destination_port, 40000);

        let quad = TcpQuad {
            src_ip: "10.0.0.5".parse().unwrap(),
            src_port: 40000,
            dst_ip: "93.184.216.34".parse().unwrap(),
            dst_port: 80,
        };
        let key = nat::InternalKey {
            kind: NatKind::Tcp,
            internal_ip: "10.0.0.5".parse().unwrap(),
            internal_aux: 40000,
        };
        let mapping = dispatcher.nat_engine().lookup_internal(key).unwrap();
        assert_eq!(mapping.connection(quad).unwrap().state(), ConnState::SynReceived);

        let (_, ack_bytes) = tcp_segment(40000, 80, 1001, 5001, false, true, "10.0.0.5", "93.184.216.34");
        let ack_header = ip_header("10.0.0.5", "93.184.216.34", 64, IpNumber::TCP, ack_bytes.len() as u16);
        let ack_frame = eth_ipv4_frame(Mac([0, 0, 0, 0, 0, 1]), Mac([2, 2, 2, 2, 2, 2]), &ack_header, &ack_bytes);
        dispatcher.dispatch(&ack_frame, "internal");

        let mapping = dispatcher.nat_engine().lookup_internal(key).unwrap();
        assert_eq!(mapping.connection(quad).unwrap().state(), ConnState::Established);
    }
}
