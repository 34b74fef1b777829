//! Transport strategy selection and background rendezvous polling.
//!
//! Three ways a session moves datagrams: direct to a known IP, through a
//! blind-forwarding relay, or peer-to-peer with candidate addresses
//! exchanged via the rendezvous service. The rendezvous poller keeps the
//! P2P candidate set fresh without ever blocking the tick loop.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};

use super::lobby::{LobbyClient, RoomInfo};

/// How a playing session moves datagrams to the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// The host IP is known; send straight to it.
    Direct,
    /// A blind forwarding server sits in the middle; every payload is
    /// wrapped in a tagged envelope.
    Relay {
        lobby_id: String,
        control_addr: SocketAddr,
        state_addr: SocketAddr,
    },
    /// Candidate endpoints from the rendezvous service; the sender races
    /// all of them each tick.
    P2p { room_code: String },
}

/// Resolve a directory-supplied host (IP literal or hostname) and port
/// to a socket address. Resolution happens at session setup, never on
/// the per-tick path.
pub fn resolve_addr(host: &str, port: u16) -> Option<SocketAddr> {
    (host, port).to_socket_addrs().ok()?.next()
}

/// Granularity of the worker's shutdown check while sleeping.
const POLL_SLEEP_STEP: Duration = Duration::from_millis(100);

/// Background worker that polls `GET /rooms/{code}` on a fixed interval
/// and posts each result into a single-slot inbox.
///
/// The tick loop drains the inbox non-blockingly and replaces its
/// destination list wholesale; a result that lands after the session has
/// moved on is simply never drained.
pub struct RendezvousPoller {
    inbox: Receiver<RoomInfo>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RendezvousPoller {
    /// Spawn the poll worker. It owns its own blocking `LobbyClient` so a
    /// slow or hanging HTTP call can never stall the broadcast path.
    pub fn spawn(client: LobbyClient, room_code: String, interval: Duration) -> Self {
        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));

        let stop_flag = Arc::clone(&stop);
        // The worker holds a receiver clone so a full slot is replaced,
        // never appended to.
        let drain = rx.clone();
        let worker = std::thread::spawn(move || {
            poll_loop(client, room_code, interval, tx, drain, stop_flag);
        });

        Self {
            inbox: rx,
            stop,
            worker: Some(worker),
        }
    }

    /// Take the freshest poll result, if one arrived since the last call.
    pub fn try_take(&self) -> Option<RoomInfo> {
        let mut latest = None;
        while let Ok(info) = self.inbox.try_recv() {
            latest = Some(info);
        }
        latest
    }
}

impl Drop for RendezvousPoller {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn poll_loop(
    client: LobbyClient,
    room_code: String,
    interval: Duration,
    tx: Sender<RoomInfo>,
    drain: Receiver<RoomInfo>,
    stop: Arc<AtomicBool>,
) {
    loop {
        match client.get_room(&room_code) {
            Ok(info) => {
                // Single-slot replace: discard the stale value, post the new one.
                let _ = drain.try_recv();
                let _ = tx.try_send(info);
            }
            Err(e) => {
                // The previous candidate list stays in force.
                tracing::debug!("Rendezvous poll for room {} failed: {}", room_code, e);
            }
        }

        let mut slept = Duration::ZERO;
        while slept < interval {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(POLL_SLEEP_STEP);
            slept += POLL_SLEEP_STEP;
        }
        if stop.load(Ordering::SeqCst) {
            return;
        }
    }
}
