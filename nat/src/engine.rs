// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The NAT engine: concurrent bidirectional mapping table plus its one-second
//! sweeper (§4.5).
//!
//! Like the ARP cache, all state lives behind a single re-entrant mutex (§5);
//! `lookup`-style methods return owned copies so callers never hold the lock
//! while acting on a mapping (§3 invariant, §9 "Lookups return copies").

use crate::connection::{ConnState, TcpQuad};
use crate::mapping::{InternalKey, NatKind, NatMapping};
use crate::port::PortAllocator;
use crate::timeouts::NatTimeouts;
use ahash::RandomState;
use concurrency::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, trace};

/// An inbound TCP SYN held against the chance its internal counterpart shows up
/// as an outbound SYN allocated to the same external port (§3, §4.5).
struct PendingSyn {
    frame: Vec<u8>,
    received_at: Instant,
}

/// One outcome of a sweep pass that the caller (the NAT sweeper thread, wired up
/// alongside the dispatcher) must act on.
#[derive(Debug, Clone)]
pub enum NatSweepEffect {
    /// An unsolicited inbound SYN was never claimed by a matching outbound SYN
    /// within the hold timeout; emit ICMP port-unreachable back to its source.
    UnsolicitedSynUnmatched {
        /// The original buffered inbound frame.
        frame: Vec<u8>,
    },
}

/// What happened to an inbound TCP segment with no matching external mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsolicitedOutcome {
    /// Buffered as a fresh unsolicited SYN, awaiting a matching outbound mapping.
    Buffered,
    /// A hold was already in progress for this external port.
    AlreadyBuffered,
    /// Not a bare SYN; dropped per §4.5/§7.
    Dropped,
}

#[derive(Default)]
struct Inner {
    by_internal: HashMap<InternalKey, NatMapping, RandomState>,
    by_external: HashMap<(NatKind, u16), InternalKey, RandomState>,
    allocator: PortAllocator,
    pending_syn: HashMap<u16, PendingSyn, RandomState>,
}

impl Inner {
    fn new() -> Self {
        Self {
            by_internal: HashMap::with_hasher(RandomState::with_seed(0)),
            by_external: HashMap::with_hasher(RandomState::with_seed(1)),
            allocator: PortAllocator::new(),
            pending_syn: HashMap::with_hasher(RandomState::with_seed(2)),
        }
    }

    /// Finds the mapping for `key`, allocating and inserting a fresh one (with
    /// `external_ip`) if none exists yet. Returns `None` only on port exhaustion.
    fn lookup_or_insert(&mut self, key: InternalKey, external_ip: Ipv4Addr, now: Instant) -> Option<&mut NatMapping> {
        if !self.by_internal.contains_key(&key) {
            let external_aux = self.allocator.allocate()?;
            self.by_external.insert((key.kind, external_aux), key);
            self.by_internal.insert(
                key,
                NatMapping::new(key.kind, key.internal_ip, key.internal_aux, external_ip, external_aux, now),
            );
            debug!(kind = ?key.kind, internal_ip = %key.internal_ip, internal_aux = key.internal_aux, external_aux, "nat mapping created");
        }
        self.by_internal.get_mut(&key)
    }
}

/// The concurrent NAT mapping table.
pub struct NatEngine {
    inner: ReentrantMutex<RefCell<Inner>>,
    timeouts: NatTimeouts,
}

impl NatEngine {
    /// Creates an empty engine with the given sweeper timeouts.
    #[must_use]
    pub fn new(timeouts: NatTimeouts) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner::new())),
            timeouts,
        }
    }

    /// Returns a copy of the mapping keyed by its internal endpoint.
    #[must_use]
    pub fn lookup_internal(&self, key: InternalKey) -> Option<NatMapping> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.by_internal.get(&key).cloned()
    }

    /// Returns a copy of the mapping keyed by its allocated external aux.
    #[must_use]
    pub fn lookup_external(&self, kind: NatKind, external_aux: u16) -> Option<NatMapping> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let key = inner.by_external.get(&(kind, external_aux))?;
        inner.by_internal.get(key).cloned()
    }

    /// Outbound ICMP-query path (§4.5): looks up (or creates) the mapping for
    /// `internal_ip`/`icmp_id`, returning its external aux. `None` only if the
    /// port space is exhausted.
    pub fn outbound_icmp_query(&self, internal_ip: Ipv4Addr, external_ip: Ipv4Addr, icmp_id: u16, now: Instant) -> Option<NatMapping> {
        let key = InternalKey {
            kind: NatKind::IcmpQuery,
            internal_ip,
            internal_aux: icmp_id,
        };
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let mapping = inner.lookup_or_insert(key, external_ip, now)?;
        mapping.touch(now);
        Some(mapping.clone())
    }

    /// Inbound ICMP-query path (§4.5): looks up the mapping by external id.
    #[must_use]
    pub fn inbound_icmp_query(&self, external_id: u16, now: Instant) -> Option<NatMapping> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let key = *inner.by_external.get(&(NatKind::IcmpQuery, external_id))?;
        let mapping = inner.by_internal.get_mut(&key)?;
        mapping.touch(now);
        Some(mapping.clone())
    }

    /// Outbound TCP path (§4.5): looks up (or creates) the mapping for
    /// `internal_ip`/`quad.src_port`, applies the connection transition table for
    /// `quad`, and returns the updated mapping.
    #[allow(clippy::too_many_arguments)]
    pub fn outbound_tcp(
        &self,
        internal_ip: Ipv4Addr,
        external_ip: Ipv4Addr,
        quad: TcpQuad,
        syn: bool,
        ack: bool,
        seq: u32,
        ack_num: u32,
        now: Instant,
    ) -> Option<NatMapping> {
        let key = InternalKey {
            kind: NatKind::Tcp,
            internal_ip,
            internal_aux: quad.src_port,
        };
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let mapping = inner.lookup_or_insert(key, external_ip, now)?;
        mapping.observe_tcp_segment(quad, syn, ack, seq, ack_num, now);
        Some(mapping.clone())
    }

    /// Inbound TCP path for a segment matching an existing external mapping
    /// (§4.5): applies the mirrored connection transition and returns the
    /// updated mapping.
    #[allow(clippy::too_many_arguments)]
    pub fn inbound_tcp(
        &self,
        external_port: u16,
        quad: TcpQuad,
        syn: bool,
        ack: bool,
        seq: u32,
        ack_num: u32,
        now: Instant,
    ) -> Option<NatMapping> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let key = *inner.by_external.get(&(NatKind::Tcp, external_port))?;
        let mapping = inner.by_internal.get_mut(&key)?;
        mapping.observe_tcp_segment(quad, syn, ack, seq, ack_num, now);
        Some(mapping.clone())
    }

    /// Handles an inbound TCP segment with no matching external mapping (§4.5):
    /// a bare SYN is buffered for up to the unsolicited-hold timeout; anything
    /// else is dropped.
    pub fn inbound_tcp_unmapped(&self, external_port: u16, syn: bool, ack: bool, frame: Vec<u8>, now: Instant) -> UnsolicitedOutcome {
        if !(syn && !ack) {
            return UnsolicitedOutcome::Dropped;
        }
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.pending_syn.contains_key(&external_port) {
            return UnsolicitedOutcome::AlreadyBuffered;
        }
        inner.pending_syn.insert(external_port, PendingSyn { frame, received_at: now });
        trace!(external_port, "buffered unsolicited inbound SYN");
        UnsolicitedOutcome::Buffered
    }

    /// Expires idle mappings/connections and times out unclaimed unsolicited
    /// SYNs. Intended to run once per second from a background sweeper (§4.5, §5).
    #[must_use]
    pub fn sweep(&self) -> Vec<NatSweepEffect> {
        let now = Instant::now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        for mapping in inner.by_internal.values_mut() {
            mapping.expire_connections(now, self.timeouts.tcp_established_idle, self.timeouts.tcp_transitory);
        }

        let timeouts = self.timeouts;
        let expired: Vec<(InternalKey, u16)> = inner
            .by_internal
            .values()
            .filter(|mapping| {
                let timeout = match mapping.kind() {
                    NatKind::IcmpQuery => timeouts.icmp_query_idle,
                    NatKind::Tcp => {
                        let established = mapping.connections().iter().any(|c| c.state() == ConnState::Established);
                        if established { timeouts.tcp_established_idle } else { timeouts.tcp_transitory }
                    }
                };
                now.duration_since(mapping.last_touched()) > timeout
            })
            .map(|mapping| (mapping.internal_key(), mapping.external_aux()))
            .collect();

        for (key, external_aux) in &expired {
            inner.by_internal.remove(key);
            inner.by_external.remove(&(key.kind, *external_aux));
            debug!(kind = ?key.kind, internal_ip = %key.internal_ip, "nat mapping expired");
        }

        let claimed: std::collections::HashSet<u16> = inner
            .by_external
            .keys()
            .filter(|(kind, _)| *kind == NatKind::Tcp)
            .map(|(_, aux)| *aux)
            .collect();

        let mut effects = Vec::new();
        let timed_out: Vec<u16> = inner
            .pending_syn
            .iter()
            .filter(|(port, pending)| {
                !claimed.contains(*port) && now.duration_since(pending.received_at) > self.timeouts.unsolicited_syn_hold
            })
            .map(|(port, _)| *port)
            .collect();
        for port in timed_out {
            if let Some(pending) = inner.pending_syn.remove(&port) {
                effects.push(NatSweepEffect::UnsolicitedSynUnmatched { frame: pending.frame });
            }
        }
        // Any pending SYN whose port was claimed by a real mapping in the meantime
        // is silently dropped: a matching outbound SYN did appear (§4.5).
        inner.pending_syn.retain(|port, _| !claimed.contains(port));

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn quad(src_port: u16) -> TcpQuad {
        TcpQuad {
            src_ip: Ipv4Addr::new(10, 0, 0, 5),
            src_port,
            dst_ip: Ipv4Addr::new(93, 184, 216, 34),
            dst_port: 80,
        }
    }

    #[test]
    #[traced_test]
    fn outbound_icmp_query_allocates_from_1024() {
        let engine = NatEngine::new(NatTimeouts::default());
        let internal = Ipv4Addr::new(10, 0, 0, 5);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        let mapping = engine.outbound_icmp_query(internal, external, 7, Instant::now()).unwrap();
        assert_eq!(mapping.external_aux(), 1024);
        assert_eq!(mapping.external_ip(), external);

        let again = engine.outbound_icmp_query(internal, external, 7, Instant::now()).unwrap();
        assert_eq!(again.external_aux(), 1024, "same internal key reuses the mapping");
    }

    #[test]
    fn inbound_icmp_query_recovers_internal_endpoint() {
        let engine = NatEngine::new(NatTimeouts::default());
        let internal = Ipv4Addr::new(10, 0, 0, 5);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        let mapping = engine.outbound_icmp_query(internal, external, 7, Instant::now()).unwrap();

        let back = engine.inbound_icmp_query(mapping.external_aux(), Instant::now()).unwrap();
        assert_eq!(back.internal_ip(), internal);
        assert_eq!(back.internal_aux(), 7);
    }

    #[test]
    fn tcp_handshake_advances_through_outbound_and_inbound_calls() {
        let engine = NatEngine::new(NatTimeouts::default());
        let internal = Ipv4Addr::new(10, 0, 0, 5);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        let now = Instant::now();

        let q = quad(40000);
        let mapping = engine
            .outbound_tcp(internal, external, q, true, false, 1000, 0, now)
            .unwrap();
        assert_eq!(mapping.external_aux(), 1024);
        assert_eq!(mapping.connection(q).unwrap().state(), ConnState::SynSent);

        let mapping = engine.inbound_tcp(1024, q, true, true, 5000, 1001, now).unwrap();
        assert_eq!(mapping.connection(q).unwrap().state(), ConnState::SynReceived);

        let mapping = engine
            .outbound_tcp(internal, external, q, false, true, 1001, 5001, now)
            .unwrap();
        assert_eq!(mapping.connection(q).unwrap().state(), ConnState::Established);
    }

    #[test]
    fn unsolicited_syn_times_out_into_unreachable_effect() {
        let mut timeouts = NatTimeouts::default();
        timeouts.unsolicited_syn_hold = Duration::from_millis(10);
        let engine = NatEngine::new(timeouts);

        let outcome = engine.inbound_tcp_unmapped(2048, true, false, vec![1, 2, 3], Instant::now());
        assert_eq!(outcome, UnsolicitedOutcome::Buffered);

        std::thread::sleep(Duration::from_millis(20));
        let effects = engine.sweep();
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], NatSweepEffect::UnsolicitedSynUnmatched { frame } if frame == &[1, 2, 3]));
    }

    #[test]
    fn unsolicited_syn_claimed_by_outbound_mapping_emits_nothing() {
        let mut timeouts = NatTimeouts::default();
        timeouts.unsolicited_syn_hold = Duration::from_millis(10);
        let engine = NatEngine::new(timeouts);

        // Allocator starts at 1024; claim it immediately so the next inbound
        // buffered port (1024) matches a real mapping before it times out.
        let internal = Ipv4Addr::new(10, 0, 0, 9);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        engine.outbound_tcp(internal, external, quad(50000), true, false, 1, 0, Instant::now());

        engine.inbound_tcp_unmapped(1024, true, false, vec![9], Instant::now());
        std::thread::sleep(Duration::from_millis(20));
        let effects = engine.sweep();
        assert!(effects.is_empty());
    }

    #[test]
    fn icmp_query_mapping_expires_after_idle_timeout() {
        let mut timeouts = NatTimeouts::default();
        timeouts.icmp_query_idle = Duration::from_millis(10);
        let engine = NatEngine::new(timeouts);
        let internal = Ipv4Addr::new(10, 0, 0, 5);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        let mapping = engine.outbound_icmp_query(internal, external, 7, Instant::now()).unwrap();
        let aux = mapping.external_aux();

        std::thread::sleep(Duration::from_millis(20));
        engine.sweep();
        assert!(engine.inbound_icmp_query(aux, Instant::now()).is_none());
    }

    #[test]
    fn syn_sent_only_mapping_expires_at_transitory_not_established_timeout() {
        let mut timeouts = NatTimeouts::default();
        timeouts.tcp_transitory = Duration::from_millis(10);
        timeouts.tcp_established_idle = Duration::from_secs(7440);
        let engine = NatEngine::new(timeouts);
        let internal = Ipv4Addr::new(10, 0, 0, 5);
        let external = Ipv4Addr::new(203, 0, 113, 1);
        let q = quad(40000);

        let mapping = engine.outbound_tcp(internal, external, q, true, false, 1000, 0, Instant::now()).unwrap();
        assert_eq!(mapping.connection(q).unwrap().state(), ConnState::SynSent);
        let aux = mapping.external_aux();

        std::thread::sleep(Duration::from_millis(20));
        engine.sweep();
        assert!(
            engine.inbound_tcp(aux, q, true, true, 5000, 1001, Instant::now()).is_none(),
            "a mapping that never reached Established must expire at the transitory timeout, not the established one"
        );
    }
}
