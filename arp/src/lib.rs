// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The ARP cache and its request-retry state machine (§3, §4.4).

#![deny(missing_docs, clippy::all)]

pub mod cache;
pub mod entry;
pub mod request;

pub use cache::{ArpCache, ArpEffect};
pub use entry::ArpEntry;
pub use request::{ArpRequest, PendingPacket, MAX_ATTEMPTS, RETRY_INTERVAL};
