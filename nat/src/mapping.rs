// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A NAT mapping: the long-lived translation record shared by every flow from
//! one internal endpoint (§3).

use crate::connection::{TcpConnection, TcpQuad};
use std::net::Ipv4Addr;
use std::time::Instant;

/// Which kind of flow a mapping translates. The aux value is a TCP port for
/// `Tcp`, an ICMP identifier for `IcmpQuery` (§3 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatKind {
    /// ICMP echo request/reply query flow.
    IcmpQuery,
    /// TCP flow.
    Tcp,
}

/// The internal-facing key identifying a mapping: its kind plus the internal
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternalKey {
    /// Flow kind.
    pub kind: NatKind,
    /// Internal IPv4 address.
    pub internal_ip: Ipv4Addr,
    /// TCP port or ICMP identifier on the internal side.
    pub internal_aux: u16,
}

/// A bidirectional NAT translation record for one internal endpoint.
#[derive(Debug, Clone)]
pub struct NatMapping {
    kind: NatKind,
    internal_ip: Ipv4Addr,
    internal_aux: u16,
    external_ip: Ipv4Addr,
    external_aux: u16,
    last_touched: Instant,
    connections: Vec<TcpConnection>,
}

impl NatMapping {
    pub(crate) fn new(
        kind: NatKind,
        internal_ip: Ipv4Addr,
        internal_aux: u16,
        external_ip: Ipv4Addr,
        external_aux: u16,
        now: Instant,
    ) -> Self {
        Self {
            kind,
            internal_ip,
            internal_aux,
            external_ip,
            external_aux,
            last_touched: now,
            connections: Vec::new(),
        }
    }

    /// This mapping's flow kind.
    #[must_use]
    pub fn kind(&self) -> NatKind {
        self.kind
    }

    /// The internal-facing key that looks this mapping up.
    #[must_use]
    pub fn internal_key(&self) -> InternalKey {
        InternalKey {
            kind: self.kind,
            internal_ip: self.internal_ip,
            internal_aux: self.internal_aux,
        }
    }

    /// Internal IPv4 address this mapping translates for.
    #[must_use]
    pub fn internal_ip(&self) -> Ipv4Addr {
        self.internal_ip
    }

    /// Internal-side TCP port or ICMP identifier.
    #[must_use]
    pub fn internal_aux(&self) -> u16 {
        self.internal_aux
    }

    /// The external interface's address, always equal across every live mapping
    /// of the router (§3 invariant).
    #[must_use]
    pub fn external_ip(&self) -> Ipv4Addr {
        self.external_ip
    }

    /// Allocated external-side TCP port or ICMP identifier.
    #[must_use]
    pub fn external_aux(&self) -> u16 {
        self.external_aux
    }

    /// Timestamp of the most recent packet that touched this mapping.
    #[must_use]
    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_touched = now;
    }

    /// Connection records belonging to this mapping (always empty for ICMP).
    #[must_use]
    pub fn connections(&self) -> &[TcpConnection] {
        &self.connections
    }

    /// Finds the connection record for `quad` and applies the observed segment
    /// to its transition table, or creates a fresh `SynSent` record if this is a
    /// bare SYN opening a new flow (§4.5). Any other unmatched segment passes
    /// through with no tracked state.
    pub(crate) fn observe_tcp_segment(
        &mut self,
        quad: TcpQuad,
        syn: bool,
        ack: bool,
        seq: u32,
        ack_num: u32,
        now: Instant,
    ) {
        self.touch(now);
        if let Some(connection) = self.connections.iter_mut().find(|c| c.quad() == quad) {
            connection.observe_segment(syn, ack, seq, ack_num, now);
        } else if syn && !ack {
            self.connections.push(TcpConnection::new_outbound(quad, seq, now));
        }
    }

    /// Returns a copy of the connection record tracking `quad`, if any.
    #[must_use]
    pub fn connection(&self, quad: TcpQuad) -> Option<TcpConnection> {
        self.connections.iter().find(|c| c.quad() == quad).cloned()
    }

    pub(crate) fn expire_connections(&mut self, now: Instant, established: Duration, transitory: Duration) {
        self.connections.retain(|c| {
            let timeout = if c.state() == crate::connection::ConnState::Established {
                established
            } else {
                transitory
            };
            now.duration_since(c.last_touched()) <= timeout
        });
    }
}

use std::time::Duration;
