// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The static routing table: an ordered list of routes, looked up by
//! longest-prefix match (§4.2).

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// A single static route: destination network, gateway (unspecified for directly
/// connected routes), mask, and outgoing interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination network address.
    pub destination: Ipv4Addr,
    /// Next-hop gateway. For a directly connected route this equals the
    /// destination being resolved, by convention `0.0.0.0`.
    pub gateway: Ipv4Addr,
    /// Network mask.
    pub mask: Ipv4Addr,
    /// Name of the outgoing interface.
    pub interface: String,
}

impl Route {
    /// Returns whether `addr` falls within this route's masked network.
    #[must_use]
    fn matches(&self, addr: Ipv4Addr) -> bool {
        u32::from(self.destination) & u32::from(self.mask) == u32::from(addr) & u32::from(self.mask)
    }

    /// Returns the IPv4 address that ARP must resolve to reach this route's next
    /// hop: the gateway, unless this is a directly connected route (gateway
    /// `0.0.0.0`), in which case it is the destination itself (§4.6).
    #[must_use]
    pub fn next_hop(&self, destination: Ipv4Addr) -> Ipv4Addr {
        if self.gateway == Ipv4Addr::UNSPECIFIED {
            destination
        } else {
            self.gateway
        }
    }
}

/// Failure loading the routing table text file (§6).
#[derive(Debug, thiserror::Error)]
pub enum RouteLoadError {
    /// The file could not be opened/read.
    #[error("failed to read routing table file {path}: {source}")]
    Io {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A line didn't have the expected four whitespace-separated fields.
    #[error("malformed route on line {line}: {text}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line, verbatim.
        text: String,
    },
}

/// An ordered sequence of static routes. Longest-mask match wins; ties break by
/// first-encountered (stable load order, §4.2).
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Creates an empty routing table.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Appends a route, preserving load order for tie-breaking.
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Number of routes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Looks up the route for `destination`: among routes whose masked network
    /// contains it, the one with the numerically largest mask; ties keep the
    /// first-loaded route (§4.2).
    #[must_use]
    pub fn lookup(&self, destination: Ipv4Addr) -> Option<&Route> {
        let mut best: Option<&Route> = None;
        for route in &self.routes {
            if !route.matches(destination) {
                continue;
            }
            if best.is_none_or(|current| u32::from(route.mask) > u32::from(current.mask)) {
                best = Some(route);
            }
        }
        best
    }

    /// Loads a routing table from a text file: one route per line, whitespace
    /// separated as `destination gateway mask interface` (§6). Blank lines and
    /// lines starting with `#` are skipped.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<RoutingTable, RouteLoadError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|source| RouteLoadError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let mut table = RoutingTable::new();
        for (idx, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let (Some(dest), Some(gw), Some(mask), Some(iface)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(RouteLoadError::Malformed {
                    line: idx + 1,
                    text: line.to_owned(),
                });
            };
            if fields.next().is_some() {
                return Err(RouteLoadError::Malformed {
                    line: idx + 1,
                    text: line.to_owned(),
                });
            }
            let parse_addr = |s: &str| Ipv4Addr::from_str(s).ok();
            let (Some(destination), Some(gateway), Some(mask)) =
                (parse_addr(dest), parse_addr(gw), parse_addr(mask))
            else {
                return Err(RouteLoadError::Malformed {
                    line: idx + 1,
                    text: line.to_owned(),
                });
            };
            table.add(Route {
                destination,
                gateway,
                mask,
                interface: iface.to_owned(),
            });
            debug!("loaded route: {dest} gw {gw} mask {mask} via {iface}");
        }
        if table.is_empty() {
            warn!("routing table file {} contained no routes", path_ref.display());
        }
        Ok(table)
    }
}
