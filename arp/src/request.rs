// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A pending ARP resolution and the packets queued behind it (§3, §4.4).

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Spacing between successive retransmissions of an unresolved request (§4.4).
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Number of broadcast attempts before a request gives up and reports
/// host-unreachable for its queued packets (§4.4).
pub const MAX_ATTEMPTS: u8 = 5;

/// A frame held pending resolution of its next-hop's hardware address.
///
/// Holds the original inbound link-layer framing verbatim: its IP checksum was
/// valid when enqueued and must still be valid when it is finally sent or turned
/// into an ICMP host-unreachable (§3 invariants).
#[derive(Debug, Clone)]
pub struct PendingPacket {
    frame: Vec<u8>,
    outbound_interface: String,
}

impl PendingPacket {
    /// Builds a pending packet from the frame bytes to send and the interface
    /// that will carry it once the next hop resolves.
    #[must_use]
    pub fn new(frame: Vec<u8>, outbound_interface: impl Into<String>) -> Self {
        Self {
            frame,
            outbound_interface: outbound_interface.into(),
        }
    }

    /// The original frame bytes.
    #[must_use]
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// The interface this packet was due to leave on.
    #[must_use]
    pub fn outbound_interface(&self) -> &str {
        &self.outbound_interface
    }
}

/// A resolution in flight for `target_ip`, with everything awaiting it.
#[derive(Debug, Clone)]
pub struct ArpRequest {
    target_ip: Ipv4Addr,
    attempts: u8,
    last_attempt: Instant,
    queue: Vec<PendingPacket>,
}

impl ArpRequest {
    pub(crate) fn new(target_ip: Ipv4Addr, now: Instant) -> Self {
        Self {
            target_ip,
            attempts: 0,
            last_attempt: now,
            queue: Vec::new(),
        }
    }

    /// The IPv4 address this request is trying to resolve.
    #[must_use]
    pub fn target_ip(&self) -> Ipv4Addr {
        self.target_ip
    }

    /// Number of broadcast attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Packets currently queued behind this resolution.
    #[must_use]
    pub fn queue(&self) -> &[PendingPacket] {
        &self.queue
    }

    pub(crate) fn push(&mut self, packet: PendingPacket) {
        self.queue.push(packet);
    }

    /// Whether this request is due for another attempt as of `now`: a brand new
    /// request (no attempts yet) is always due, so the first broadcast goes out
    /// immediately rather than waiting for the next sweep tick.
    #[must_use]
    pub(crate) fn due_for_retry(&self, now: Instant) -> bool {
        self.attempts == 0 || now.duration_since(self.last_attempt) > RETRY_INTERVAL
    }

    /// Records one more attempt, returning whether this was the fifth and final
    /// one (`times_sent == 5`, §4.4).
    pub(crate) fn record_attempt(&mut self, now: Instant) -> bool {
        self.attempts += 1;
        self.last_attempt = now;
        self.attempts >= MAX_ATTEMPTS
    }
}
