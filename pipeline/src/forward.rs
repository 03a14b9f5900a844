// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forwarding path (§4.6): TTL decrement, route lookup, ARP resolution or
//! queuing, and the shared helper that both forwarding and self-originated
//! ICMP errors use to reach the next hop.

use crate::action::Action;
use crate::reply;
use arp::{ArpEffect, ArpRequest, PendingPacket};
use net::eth::{EtherType, EthHeader, Mac};
use net::icmp;
use net::ipv4::{self, Ipv4Header};
use routing::{Interface, InterfaceTable, RoutingTable};
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// Shared state the forwarding path and outbound NAT both need: the interface
/// set, static routes, and the ARP cache that resolves next hops.
pub struct Forwarder<'a> {
    pub(crate) interfaces: &'a InterfaceTable,
    pub(crate) routes: &'a RoutingTable,
    pub(crate) arp: &'a arp::ArpCache,
}

impl<'a> Forwarder<'a> {
    /// Builds a forwarder borrowing the dispatcher's shared tables.
    #[must_use]
    pub fn new(interfaces: &'a InterfaceTable, routes: &'a RoutingTable, arp: &'a arp::ArpCache) -> Self {
        Self { interfaces, routes, arp }
    }

    /// Forwards a non-local IP packet (§4.6): decrements TTL, looks up the
    /// route, and either sends immediately (ARP hit) or queues against ARP
    /// resolution (ARP miss), triggering the first retry inline.
    ///
    /// `ip_header` must already have passed the TTL-expired check; `payload`
    /// is everything after the IP header. Returns the actions to transmit.
    pub fn forward(&self, mut ip_header: Ipv4Header, payload: &[u8]) -> Vec<Action> {
        if !ipv4::decrement_ttl(&mut ip_header) {
            // Caller is expected to have checked TTL before calling forward();
            // defend anyway rather than ship a packet with an invalid header.
            return Vec::new();
        }
        let destination = ipv4::destination(&ip_header);
        let Some(route) = self.routes.lookup(destination) else {
            debug!(%destination, "no route, emitting network unreachable");
            return self.originate_icmp_error(
                icmp::TYPE_DEST_UNREACHABLE,
                icmp::CODE_NET_UNREACHABLE,
                ipv4::source(&ip_header),
                &Self::reconstruct(&ip_header, payload),
            );
        };
        let Some(outbound) = self.interfaces.get(&route.interface) else {
            debug!(interface = %route.interface, "route names unknown interface");
            return Vec::new();
        };

        let mut frame = Vec::new();
        ipv4::write_ipv4(&ip_header, &mut frame);
        frame.extend_from_slice(payload);
        self.send_via_route(route.next_hop(destination), &outbound, frame)
    }

    /// Sends `ip_packet` (header + payload, no Ethernet framing yet) toward
    /// `next_hop` out `outbound`: ARP hit sends immediately, ARP miss queues
    /// the frame and kicks off the retry driver (§4.6).
    pub fn send_via_route(&self, next_hop: Ipv4Addr, outbound: &Interface, ip_packet: Vec<u8>) -> Vec<Action> {
        if let Some(entry) = self.arp.lookup(next_hop) {
            let mut frame = Vec::with_capacity(EthHeader::LEN + ip_packet.len());
            EthHeader {
                destination: entry.mac(),
                source: outbound.mac(),
                ether_type: EtherType::IPV4,
            }
            .write(&mut frame);
            frame.extend_from_slice(&ip_packet);
            return vec![Action::new(frame, outbound.name())];
        }

        let mut frame = Vec::with_capacity(EthHeader::LEN + ip_packet.len());
        EthHeader {
            destination: Mac::ZERO,
            source: outbound.mac(),
            ether_type: EtherType::IPV4,
        }
        .write(&mut frame);
        frame.extend_from_slice(&ip_packet);

        self.arp.queue(next_hop, PendingPacket::new(frame, outbound.name()));
        trace!(%next_hop, interface = outbound.name(), "arp miss, packet queued");
        self.effects_to_actions(self.arp.drive_retry(next_hop).into_iter().collect())
    }

    /// Re-drives the packets that were queued behind `request` now that its
    /// target has resolved (§4.4): rewrites the Ethernet addressing in place
    /// and sends each one out the interface it was originally queued on.
    #[must_use]
    pub fn redrive(&self, request: &ArpRequest) -> Vec<Action> {
        let Some(entry) = self.arp.lookup(request.target_ip()) else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        for packet in request.queue() {
            let Some(outbound) = self.interfaces.get(packet.outbound_interface()) else {
                continue;
            };
            let mut frame = packet.frame().to_vec();
            if frame.len() < EthHeader::LEN {
                continue;
            }
            frame[0..6].copy_from_slice(&<[u8; 6]>::from(entry.mac()));
            frame[6..12].copy_from_slice(&<[u8; 6]>::from(outbound.mac()));
            actions.push(Action::new(frame, outbound.name()));
        }
        actions
    }

    /// Emits a self-originated ICMP error (§4.6, §4.7) back toward the sender
    /// of `ip_header`/`payload`. Public entry point for the dispatcher's own
    /// reject paths (TTL exceeded, port unreachable).
    #[must_use]
    pub fn reject(&self, icmp_type: u8, code: u8, ip_header: &Ipv4Header, payload: &[u8]) -> Vec<Action> {
        self.originate_icmp_error(icmp_type, code, ipv4::source(ip_header), &Self::reconstruct(ip_header, payload))
    }

    /// Emits a self-originated ICMP error (§4.6, §4.7) back toward
    /// `offending_source`, routed the same way any other packet would be.
    /// Never recurses: a route miss while emitting an error is silently
    /// dropped rather than generating another error (§7).
    fn originate_icmp_error(&self, icmp_type: u8, code: u8, offending_source: Ipv4Addr, offending_ip_packet: &[u8]) -> Vec<Action> {
        let Some(route) = self.routes.lookup(offending_source) else {
            return Vec::new();
        };
        let Some(outbound) = self.interfaces.get(&route.interface) else {
            return Vec::new();
        };
        let (header, message) = reply::icmp_error_ip_packet(icmp_type, code, outbound.ipv4(), offending_source, offending_ip_packet);
        let mut ip_packet = Vec::new();
        ipv4::write_ipv4(&header, &mut ip_packet);
        ip_packet.extend_from_slice(&message);

        let next_hop = route.next_hop(offending_source);
        if self.arp.lookup(next_hop).is_some() {
            self.send_via_route(next_hop, &outbound, ip_packet)
        } else {
            // Do not queue self-originated errors against ARP resolution: if the
            // destination isn't already resolvable, drop rather than spend a
            // retry cycle on a best-effort diagnostic (§5 re-entrancy note).
            Vec::new()
        }
    }

    /// Converts ARP sweep/retry effects into actions: broadcasts go out every
    /// interface, unreachables become ICMP host-unreachable per queued packet.
    #[must_use]
    pub fn effects_to_actions(&self, effects: Vec<ArpEffect>) -> Vec<Action> {
        let mut actions = Vec::new();
        for effect in effects {
            match effect {
                ArpEffect::Broadcast { target_ip } => {
                    for iface in self.interfaces.iter() {
                        actions.push(Action::new(reply::arp_request(iface, target_ip), iface.name()));
                    }
                }
                ArpEffect::Unreachable { packets } => {
                    actions.extend(self.host_unreachable_for(packets));
                }
            }
        }
        actions
    }

    fn host_unreachable_for(&self, packets: Vec<PendingPacket>) -> Vec<Action> {
        let mut actions = Vec::new();
        for packet in packets {
            let Ok((eth, rest)) = EthHeader::parse(packet.frame()) else {
                continue;
            };
            if eth.ether_type != EtherType::IPV4 {
                continue;
            }
            let Ok((ip_header, payload)) = ipv4::parse_ipv4(rest) else {
                continue;
            };
            let offending = Self::reconstruct(&ip_header, payload);
            actions.extend(self.originate_icmp_error(
                icmp::TYPE_DEST_UNREACHABLE,
                icmp::CODE_HOST_UNREACHABLE,
                ipv4::source(&ip_header),
                &offending,
            ));
        }
        actions
    }

    fn reconstruct(header: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ipv4::write_ipv4(header, &mut out);
        out.extend_from_slice(payload);
        out
    }
}
