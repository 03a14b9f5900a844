// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Router configuration: NAT enablement, the designated internal/external
//! interfaces, and the NAT sweeper timeouts (§6).

#![deny(missing_docs, clippy::all)]

use nat::NatTimeouts;
use net::eth::Mac;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Failure loading a [`RouterConfig`] from a YAML file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be opened/read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents did not deserialize as a [`RouterConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Wire representation of [`NatTimeouts`] in seconds, for a human-editable config
/// file. Mirrors the defaults in §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatTimeoutsConfig {
    /// §4.5 "ICMP-query mapping idle" timeout, in seconds.
    pub icmp_query_idle_secs: u64,
    /// §4.5 "TCP established idle" timeout, in seconds.
    pub tcp_established_idle_secs: u64,
    /// §4.5 "TCP transitory" timeout, in seconds.
    pub tcp_transitory_secs: u64,
    /// §4.5 "Unsolicited inbound SYN hold" timeout, in seconds.
    pub unsolicited_syn_hold_secs: u64,
}

impl Default for NatTimeoutsConfig {
    fn default() -> Self {
        let defaults = NatTimeouts::default();
        Self {
            icmp_query_idle_secs: defaults.icmp_query_idle.as_secs(),
            tcp_established_idle_secs: defaults.tcp_established_idle.as_secs(),
            tcp_transitory_secs: defaults.tcp_transitory.as_secs(),
            unsolicited_syn_hold_secs: defaults.unsolicited_syn_hold.as_secs(),
        }
    }
}

impl From<NatTimeoutsConfig> for NatTimeouts {
    fn from(value: NatTimeoutsConfig) -> Self {
        NatTimeouts {
            icmp_query_idle: Duration::from_secs(value.icmp_query_idle_secs),
            tcp_established_idle: Duration::from_secs(value.tcp_established_idle_secs),
            tcp_transitory: Duration::from_secs(value.tcp_transitory_secs),
            unsolicited_syn_hold: Duration::from_secs(value.unsolicited_syn_hold_secs),
        }
    }
}

/// One router-owned interface as declared in the configuration file: its
/// kernel device name, hardware address, and IPv4/netmask (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Kernel device name (e.g. `eth0`), used both to open the link-layer
    /// socket and as the name routes and the dispatcher refer to it by.
    pub name: String,
    /// Hardware address to report in ARP replies and outgoing frames.
    pub mac: Mac,
    /// Configured IPv4 address.
    pub ipv4: Ipv4Addr,
    /// Configured netmask.
    pub netmask: Ipv4Addr,
}

/// Top-level router configuration (§6): which interfaces face the internal and
/// external networks, whether NAT is active, its timeouts, and where to load
/// the static routing table from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Interfaces the router owns, with their addressing.
    pub interfaces: Vec<InterfaceConfig>,
    /// Whether the NAT engine's dispatcher paths are active (§4.5).
    pub nat_enabled: bool,
    /// Name of the interface treated as "internal" for NAT purposes.
    pub internal_interface: String,
    /// Name of the interface treated as "external" for NAT purposes.
    pub external_interface: String,
    /// NAT sweeper timeouts.
    #[serde(default)]
    pub nat_timeouts: NatTimeoutsConfig,
    /// Path to the static routing table text file (§6).
    pub route_table_path: PathBuf,
}

impl RouterConfig {
    /// Loads configuration from a YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<RouterConfig, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        serde_yaml_ng::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })
    }

    /// The configured NAT timeouts, converted to [`NatTimeouts`].
    #[must_use]
    pub fn nat_timeouts(&self) -> NatTimeouts {
        self.nat_timeouts.into()
    }

    /// Builds the interface table this configuration describes.
    #[must_use]
    pub fn interface_table(&self) -> routing::InterfaceTable {
        let mut table = routing::InterfaceTable::new();
        for iface in &self.interfaces {
            table.add(routing::Interface::new(&iface.name, iface.mac, iface.ipv4, iface.netmask));
        }
        table
    }
}
