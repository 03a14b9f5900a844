// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The ARP cache: resolved bindings, pending requests, and the one-second
//! sweep/retry tick (§4.4).
//!
//! All state lives behind a single re-entrant mutex (§5): the sweeper, while
//! holding it, classifies and drops queued packets and may re-enter [`ArpCache`]
//! methods to do so, which is why the lock must tolerate same-thread re-entry.

use crate::entry::ArpEntry;
use crate::request::{ArpRequest, PendingPacket};
use ahash::RandomState;
use concurrency::ReentrantMutex;
use net::eth::{EtherType, Mac};
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::{debug, trace};

/// One outcome of driving a pending request's retry/timeout logic: either
/// another broadcast is due, or the request gave up and the caller must emit
/// host-unreachable for whatever survives the ICMP-error filter (§4.4, §7).
#[derive(Debug, Clone)]
pub enum ArpEffect {
    /// Broadcast another ARP request for this target out every interface.
    Broadcast {
        /// The address still being resolved.
        target_ip: Ipv4Addr,
    },
    /// The request exhausted its attempts; emit ICMP host-unreachable for each
    /// of these packets (ICMP-error packets have already been filtered out).
    Unreachable {
        /// Surviving packets, in original queue order.
        packets: Vec<PendingPacket>,
    },
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Ipv4Addr, ArpEntry, RandomState>,
    requests: HashMap<Ipv4Addr, ArpRequest, RandomState>,
}

impl Inner {
    fn new() -> Self {
        Self {
            entries: HashMap::with_hasher(RandomState::with_seed(0)),
            requests: HashMap::with_hasher(RandomState::with_seed(1)),
        }
    }
}

/// The concurrent IPv4→MAC cache with its retry state machine.
pub struct ArpCache {
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArpCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner::new())),
        }
    }

    /// Returns a copy of the resolved entry for `ip`, if any and unexpired.
    #[must_use]
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<ArpEntry> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let entry = inner.entries.get(&ip)?;
        if entry.is_expired(Instant::now()) {
            None
        } else {
            Some(*entry)
        }
    }

    /// Installs a resolved binding, removing (and returning) any pending
    /// request for `ip` so the caller can re-drive its queued packets now that
    /// the hardware address is known (§4.4).
    pub fn insert(&self, ip: Ipv4Addr, mac: Mac) -> Option<ArpRequest> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let now = Instant::now();
        inner.entries.insert(ip, ArpEntry::new(ip, mac, now));
        let resolved = inner.requests.remove(&ip);
        if resolved.is_some() {
            debug!(%ip, %mac, "arp resolved, pending request cleared");
        }
        resolved
    }

    /// Appends `packet` to the pending request for `ip`, creating one if none
    /// exists, and returns a copy of the request's current state.
    pub fn queue(&self, ip: Ipv4Addr, packet: PendingPacket) -> ArpRequest {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let request = inner
            .requests
            .entry(ip)
            .or_insert_with(|| ArpRequest::new(ip, Instant::now()));
        request.push(packet);
        request.clone()
    }

    /// Removes the pending request for `ip`, if any.
    pub fn destroy(&self, ip: Ipv4Addr) {
        let guard = self.inner.lock();
        guard.borrow_mut().requests.remove(&ip);
    }

    /// Drives one retry attempt for `ip`'s pending request right away, if it
    /// exists and is due (freshly queued requests are always due). This is the
    /// "trigger the ARP retry driver" step the forwarding path performs right
    /// after a cache-miss enqueue (§4.6).
    pub fn drive_retry(&self, ip: Ipv4Addr) -> Option<ArpEffect> {
        self.attempt(ip, Instant::now())
    }

    /// Expires stale entries and retries/times-out pending requests. Intended
    /// to be called once per second by a background sweeper thread (§4.4, §5).
    #[must_use]
    pub fn sweep_and_retry(&self) -> Vec<ArpEffect> {
        let now = Instant::now();
        let targets: Vec<Ipv4Addr> = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.entries.retain(|_, entry| !entry.is_expired(now));
            inner
                .requests
                .iter()
                .filter(|(_, request)| request.due_for_retry(now))
                .map(|(ip, _)| *ip)
                .collect()
        };

        let mut effects = Vec::with_capacity(targets.len());
        for ip in targets {
            if let Some(effect) = self.attempt(ip, now) {
                effects.push(effect);
            }
        }
        effects
    }

    /// Records one attempt against `ip`'s pending request, destroying it and
    /// filtering its queue for host-unreachable once the fifth attempt lands.
    fn attempt(&self, ip: Ipv4Addr, now: Instant) -> Option<ArpEffect> {
        let exhausted = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let request = inner.requests.get_mut(&ip)?;
            if !request.due_for_retry(now) {
                return None;
            }
            request.record_attempt(now)
        };

        if !exhausted {
            trace!(%ip, "arp request retry broadcast due");
            return Some(ArpEffect::Broadcast { target_ip: ip });
        }

        let guard = self.inner.lock();
        let request = guard.borrow_mut().requests.remove(&ip)?;
        let queue = request.queue().to_vec();
        let survivors: Vec<PendingPacket> = queue
            .into_iter()
            .filter(|packet| !is_icmp_error_frame(packet.frame()))
            .collect();
        debug!(%ip, dropped = request.attempts(), "arp request exhausted after 5 attempts");
        Some(ArpEffect::Unreachable { packets: survivors })
    }
}

/// Whether `frame` is itself an ICMP error message, which must never provoke
/// another ICMP error in response (§4.4, §7).
fn is_icmp_error_frame(frame: &[u8]) -> bool {
    let Ok((eth, rest)) = net::eth::EthHeader::parse(frame) else {
        return false;
    };
    if eth.ether_type != EtherType::IPV4 {
        return false;
    }
    let Ok((ip_header, payload)) = net::ipv4::parse_ipv4(rest) else {
        return false;
    };
    if ip_header.protocol != net::ipv4::IpNumber::ICMP {
        return false;
    }
    payload
        .first()
        .is_some_and(|&icmp_type| net::icmp::is_error_type(icmp_type))
}
