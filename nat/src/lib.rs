// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Stateful NAPT: the bidirectional mapping table, its TCP connection
//! sub-state machine, and the one-second sweeper (§3, §4.5).

#![deny(missing_docs, clippy::all)]

pub mod connection;
pub mod engine;
pub mod mapping;
pub mod port;
pub mod timeouts;

pub use connection::{ConnState, TcpConnection, TcpQuad};
pub use engine::{NatEngine, NatSweepEffect, UnsolicitedOutcome};
pub use mapping::{InternalKey, NatKind, NatMapping};
pub use port::{PortAllocator, FIRST_AUX};
pub use timeouts::NatTimeouts;
