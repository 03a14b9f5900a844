// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The interface table and the static routing table: both are loaded once at boot
//! and looked up, never mutated, by the packet dispatcher (§4.2, §2).

pub mod interface;
pub mod route;

pub use interface::{Interface, InterfaceTable};
pub use route::{Route, RouteLoadError, RoutingTable};
