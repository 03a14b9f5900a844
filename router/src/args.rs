// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command-line arguments (§6 "Configuration").

pub(crate) use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "router")]
#[command(about = "A learning software IPv4 router: forwarding, ARP, ICMP, and stateful NAT", long_about = None)]
pub(crate) struct CmdArgs {
    /// Path to the router's YAML configuration file.
    #[arg(long, value_name = "PATH", default_value = "/etc/router/router.yaml")]
    config: PathBuf,

    /// Tracing filter string, e.g. `info,router_pipeline=debug`.
    #[arg(long, value_name = "FILTER", default_value = "info")]
    tracing: String,
}

impl CmdArgs {
    pub(crate) fn config_path(&self) -> &std::path::Path {
        &self.config
    }

    pub(crate) fn tracing_filter(&self) -> &str {
        &self.tracing
    }
}
