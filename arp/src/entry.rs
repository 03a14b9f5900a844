// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A single resolved IPv4→MAC binding (§3).

use net::eth::Mac;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// How long a resolved binding remains valid after insertion (§3).
pub const ENTRY_TTL: Duration = Duration::from_secs(15);

/// A resolved IPv4→MAC binding with its insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    ip: Ipv4Addr,
    mac: Mac,
    inserted_at: Instant,
}

impl ArpEntry {
    pub(crate) fn new(ip: Ipv4Addr, mac: Mac, now: Instant) -> Self {
        Self {
            ip,
            mac,
            inserted_at: now,
        }
    }

    /// The resolved IPv4 address.
    #[must_use]
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// The resolved hardware address.
    #[must_use]
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// Whether this entry is older than [`ENTRY_TTL`] as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > ENTRY_TTL
    }
}
