// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The set of router-owned interfaces: static after boot (§3).

use ahash::RandomState;
use net::eth::Mac;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// A router-owned Ethernet interface: name, hardware address, and IPv4/netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    name: &'static str,
    mac: Mac,
    ipv4: Ipv4Addr,
    netmask: Ipv4Addr,
}

impl Interface {
    /// Builds an interface record. `name` is leaked to a `'static str`: the
    /// interface set is fixed at boot and never freed, so this trades one
    /// small one-time leak per interface for an owner-free, `Copy` record.
    #[must_use]
    pub fn new(name: &str, mac: Mac, ipv4: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            name: Box::leak(name.to_owned().into_boxed_str()),
            mac,
            ipv4,
            netmask,
        }
    }

    /// The interface's short name (e.g. `eth0`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The interface's hardware address.
    #[must_use]
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// The interface's configured IPv4 address.
    #[must_use]
    pub fn ipv4(&self) -> Ipv4Addr {
        self.ipv4
    }

    /// The interface's configured netmask.
    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }
}

/// The fixed set of interfaces enumerated at boot, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    by_name: HashMap<String, Interface, RandomState>,
}

impl InterfaceTable {
    /// Creates an empty interface table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }

    /// Adds an interface to the table, replacing any prior entry of the same name.
    pub fn add(&mut self, interface: Interface) {
        self.by_name.insert(interface.name().to_owned(), interface);
    }

    /// Looks up an interface by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Interface> {
        self.by_name.get(name).copied()
    }

    /// Iterates over every interface, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.by_name.values()
    }

    /// Number of interfaces in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the table holds no interfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Returns the interface whose configured address equals `addr`, i.e. whether
    /// `addr` is one of this router's own addresses (§4.3).
    #[must_use]
    pub fn find_local(&self, addr: Ipv4Addr) -> Option<Interface> {
        self.iter().find(|iface| iface.ipv4 == addr).copied()
    }

    /// Whether `addr` belongs to this router (local delivery case of §4.3).
    #[must_use]
    pub fn is_local(&self, addr: Ipv4Addr) -> bool {
        self.find_local(addr).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, last_octet: u8) -> Interface {
        Interface::new(
            name,
            Mac([0, 0, 0, 0, 0, last_octet]),
            Ipv4Addr::new(192, 0, 2, last_octet),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }

    #[test]
    fn looks_up_by_name_and_address() {
        let mut table = InterfaceTable::new();
        table.add(iface("eth0", 1));
        table.add(iface("eth1", 2));

        assert_eq!(table.get("eth0").unwrap().ipv4(), Ipv4Addr::new(192, 0, 2, 1));
        assert!(table.get("eth2").is_none());
        assert!(table.is_local(Ipv4Addr::new(192, 0, 2, 2)));
        assert!(!table.is_local(Ipv4Addr::new(192, 0, 2, 9)));
        assert_eq!(table.len(), 2);
    }
}
