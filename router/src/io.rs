// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The link-layer shim (§6 "Link layer (consumed)"): one blocking AF_PACKET
//! socket per interface, opened once at start-up and shared by every thread
//! that needs to transmit on it.

use afpacket::sync::RawPacketStream;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Largest frame the router will ever read off the wire (§4.3 step 1).
const RECV_BUF_LEN: usize = 2048;

/// A raw packet socket bound to one interface, guarded by a mutex so both the
/// owning dispatcher thread and any other thread forwarding a packet out this
/// interface can transmit on it.
pub(crate) struct LinkSocket {
    sock: Mutex<RawPacketStream>,
}

impl LinkSocket {
    fn open(name: &str) -> io::Result<Self> {
        let mut sock = RawPacketStream::new().inspect_err(|e| warn!(interface = name, error = %e, "failed to open raw packet socket"))?;
        sock.bind(name).inspect_err(|e| warn!(interface = name, error = %e, "failed to bind raw packet socket"))?;
        Ok(Self { sock: Mutex::new(sock) })
    }

    /// Blocks until a frame is available and returns it.
    pub(crate) fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        let mut sock = self.sock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let n = sock.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Transmits a complete frame (§6 "send ... synchronously enqueues").
    pub(crate) fn send(&self, frame: &[u8]) -> io::Result<()> {
        let mut sock = self.sock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sock.write_all(frame)
    }
}

/// Every interface's socket, keyed by name, shared by every dispatcher and
/// sweeper thread.
pub(crate) struct LinkLayer {
    sockets: HashMap<String, LinkSocket>,
}

impl LinkLayer {
    /// Opens one raw packet socket per named interface.
    pub(crate) fn open(interface_names: impl IntoIterator<Item = impl AsRef<str>>) -> io::Result<Self> {
        let mut sockets = HashMap::new();
        for name in interface_names {
            let name = name.as_ref().to_owned();
            debug!(interface = name, "opening link-layer socket");
            sockets.insert(name.clone(), LinkSocket::open(&name)?);
        }
        Ok(Self { sockets })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&LinkSocket> {
        self.sockets.get(name)
    }

    /// Sends every action to its named interface, logging (not failing) on an
    /// unknown interface or a transmit error (§6: "success/failure not
    /// further actionable here").
    pub(crate) fn send_all(&self, actions: Vec<pipeline::Action>) {
        for action in actions {
            match self.get(&action.interface) {
                Some(socket) => {
                    if let Err(e) = socket.send(&action.frame) {
                        warn!(interface = action.interface, error = %e, "failed to transmit frame");
                    }
                }
                None => warn!(interface = action.interface, "dropping action for unknown interface"),
            }
        }
    }
}
