// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Wire codec for the learning router: Ethernet II, ARP, IPv4, ICMPv4 and TCP header
//! parsing and building, plus the Internet and TCP pseudo-header checksums.
//!
//! Every `parse_*` function borrows from the input slice and never allocates; every
//! `build`/`write_*` function appends to a caller-supplied buffer. Multi-byte wire
//! fields are network byte order; struct fields are host byte order once parsed,
//! except raw address octets which are kept in their wire form.

#![deny(unsafe_code, clippy::all)]

pub mod arp;
pub mod checksum;
pub mod error;
pub mod eth;
pub mod icmp;
pub mod ipv4;
pub mod tcp;

pub use error::WireError;
pub use eth::{EthHeader, EtherType, Mac};
