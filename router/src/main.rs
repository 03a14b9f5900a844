// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

mod args;
mod io;

use crate::args::{CmdArgs, Parser};
use crate::io::LinkLayer;
use arp::ArpCache;
use concurrency::sync::Arc;
use concurrency::thread;
use config::RouterConfig;
use nat::NatEngine;
use pipeline::Dispatcher;
use routing::RoutingTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

fn main() {
    let args = CmdArgs::parse();
    init_logging(args.tracing_filter());
    info!("starting router");

    let config = match RouterConfig::load_from_file(args.config_path()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let interfaces = config.interface_table();
    let interface_names: Vec<String> = interfaces.iter().map(|iface| iface.name().to_owned()).collect();

    let routes = match RoutingTable::load_from_file(&config.route_table_path) {
        Ok(routes) => routes,
        Err(e) => {
            error!(error = %e, "failed to load routing table");
            std::process::exit(1);
        }
    };

    let link = match LinkLayer::open(interface_names.clone()) {
        Ok(link) => Arc::new(link),
        Err(e) => {
            error!(error = %e, "failed to open link-layer sockets");
            std::process::exit(1);
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        interfaces,
        routes,
        ArpCache::new(),
        NatEngine::new(config.nat_timeouts()),
        config.nat_enabled,
        config.internal_interface.clone(),
        config.external_interface.clone(),
    ));

    let shutdown = Arc::new(AtomicBool::new(false));

    for name in &interface_names {
        let dispatcher = Arc::clone(&dispatcher);
        let link = Arc::clone(&link);
        let name = name.clone();
        thread::spawn(move || dispatch_loop(&dispatcher, &link, &name));
    }

    spawn_sweeper("arp-sweeper", Arc::clone(&dispatcher), Arc::clone(&link), Arc::clone(&shutdown), Dispatcher::handle_arp_sweep);
    spawn_sweeper("nat-sweeper", Arc::clone(&dispatcher), Arc::clone(&link), Arc::clone(&shutdown), Dispatcher::handle_nat_sweep);

    let (stop_tx, stop_rx) = mpsc::channel();
    let shutdown_for_handler = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, Ordering::SeqCst);
        let _ = stop_tx.send(());
    }) {
        error!(error = %e, "failed to install SIGINT handler");
        std::process::exit(1);
    }

    stop_rx.recv().expect("failed to receive shutdown signal");
    info!("shutting down router");
    std::process::exit(0);
}

/// One dispatcher thread per receiving interface (§5): blocks on the link
/// shim, classifies each frame, and transmits whatever actions it provokes.
fn dispatch_loop(dispatcher: &Dispatcher, link: &LinkLayer, interface_name: &str) {
    loop {
        let Some(socket) = link.get(interface_name) else {
            error!(interface_name, "no link socket for interface, dispatcher thread exiting");
            return;
        };
        match socket.recv() {
            Ok(frame) => {
                let actions = dispatcher.dispatch(&frame, interface_name);
                link.send_all(actions);
            }
            Err(e) => {
                warn!(interface_name, error = %e, "failed to read frame");
            }
        }
    }
}

/// A one-second sweeper thread (§5): drives either the ARP cache's or the NAT
/// engine's sweep pass and transmits its effects, observing `shutdown` between
/// passes.
fn spawn_sweeper(
    name: &'static str,
    dispatcher: Arc<Dispatcher>,
    link: Arc<LinkLayer>,
    shutdown: Arc<AtomicBool>,
    sweep: fn(&Dispatcher) -> Vec<pipeline::Action>,
) {
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(1));
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                link.send_all(sweep(&dispatcher));
            }
        })
        .expect("failed to spawn sweeper thread");
}
