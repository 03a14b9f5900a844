// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The minimal TCP connection sub-state machine tracked within a NAT mapping
//! (§3, §4.5). Exists only to classify a flow as new / half-open / established
//! for timeout purposes, never to fully model RFC 793.

use std::net::Ipv4Addr;
use std::time::Instant;

/// The four addresses/ports identifying a TCP flow, in internal-facing
/// orientation (i.e. as seen from the internal side of the translation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpQuad {
    /// Internal-side source address.
    pub src_ip: Ipv4Addr,
    /// Internal-side source port.
    pub src_port: u16,
    /// Remote destination address.
    pub dst_ip: Ipv4Addr,
    /// Remote destination port.
    pub dst_port: u16,
}

/// Connection-tracking state. Transitions only move forward; an unrecognized
/// segment leaves the state unchanged (§3 invariant, §4.5 "otherwise, forward
/// unchanged").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Outbound SYN observed, no response yet.
    SynSent,
    /// SYN+ACK observed matching the outbound SYN.
    SynReceived,
    /// Final ACK of the handshake observed.
    Established,
}

/// Per-flow TCP state within a NAT mapping.
#[derive(Debug, Clone)]
pub struct TcpConnection {
    quad: TcpQuad,
    outbound_isn: u32,
    inbound_isn: Option<u32>,
    state: ConnState,
    last_touched: Instant,
}

impl TcpConnection {
    /// Opens a new connection record in `SynSent`, as observed from an outbound
    /// bare SYN carrying `outbound_isn` as its sequence number.
    #[must_use]
    pub fn new_outbound(quad: TcpQuad, outbound_isn: u32, now: Instant) -> Self {
        Self {
            quad,
            outbound_isn,
            inbound_isn: None,
            state: ConnState::SynSent,
            last_touched: now,
        }
    }

    /// The flow this record tracks.
    #[must_use]
    pub fn quad(&self) -> TcpQuad {
        self.quad
    }

    /// Current tracking state.
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Sequence number of the outbound SYN that opened this connection.
    #[must_use]
    pub fn outbound_isn(&self) -> u32 {
        self.outbound_isn
    }

    /// Sequence number of the inbound SYN+ACK, once observed.
    #[must_use]
    pub fn inbound_isn(&self) -> Option<u32> {
        self.inbound_isn
    }

    /// Timestamp of the connection's most recent observed segment.
    #[must_use]
    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    /// Applies one observed segment against this connection's transition table
    /// (§4.5, applied identically regardless of which interface the segment
    /// arrived on — "mirrored for direction"):
    ///
    /// - `SynSent` + SYN+ACK whose ack matches `outbound_isn + 1` → `SynReceived`,
    ///   recording the inbound ISN.
    /// - `SynReceived` + pure ACK whose ack matches `inbound_isn + 1` → `Established`.
    /// - Anything else leaves the state unchanged.
    ///
    /// The last-touched timestamp is refreshed in every case: idle timeouts are
    /// keyed on traffic, not just on state-changing segments.
    pub fn observe_segment(&mut self, syn: bool, ack: bool, seq: u32, ack_num: u32, now: Instant) {
        match self.state {
            ConnState::SynSent if syn && ack && ack_num == self.outbound_isn.wrapping_add(1) => {
                self.inbound_isn = Some(seq);
                self.state = ConnState::SynReceived;
            }
            ConnState::SynReceived
                if !syn && ack && self.inbound_isn.is_some_and(|isn| ack_num == isn.wrapping_add(1)) =>
            {
                self.state = ConnState::Established;
            }
            _ => {}
        }
        self.last_touched = now;
    }
}
