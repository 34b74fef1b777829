//! Joining-participant / spectator networking.
//!
//! Runs its own receive/send cycle separate from the host session: push
//! one input sample per tick toward the host's control port, drain the
//! state socket for the newest snapshot, and hand it to the reconciler.

use std::net::SocketAddr;

use super::channel::{ChannelError, DatagramChannel};
use super::keepalive::KeepaliveTimer;
use super::protocol::{
    self, InputSample, RelayEnvelope, RelayKind, RelayRole, StateSnapshot,
};
use super::transport::RendezvousPoller;
use super::NetworkConfig;

/// Spectator registration payload. Content is irrelevant; any datagram
/// on the state port registers the sender.
const HELLO: &[u8] = b"hello";

enum Route {
    /// Known host address: one control destination, one state port to
    /// say hello to.
    Direct {
        control_dest: SocketAddr,
        state_dest: SocketAddr,
    },
    /// Blind relay in the middle; payloads travel wrapped in envelopes.
    Relay {
        lobby_id: String,
        control_addr: SocketAddr,
        state_addr: SocketAddr,
    },
    /// Candidate racing against the host's public and local endpoints.
    P2p {
        control_candidates: Vec<SocketAddr>,
        state_candidates: Vec<SocketAddr>,
    },
}

/// Network context for a joining participant or passive spectator.
pub struct JoinClient {
    control: DatagramChannel,
    state: DatagramChannel,
    route: Route,
    keepalive: KeepaliveTimer,
    poller: Option<RendezvousPoller>,
}

impl JoinClient {
    /// Join a host whose IP the user typed. Both local sockets bind
    /// ephemerally; their exact port numbers are nobody's contract.
    pub fn direct(host_ip: &str, config: &NetworkConfig) -> Result<Self, JoinError> {
        let control_dest = parse_dest(host_ip, config.control_port)?;
        let state_dest = parse_dest(host_ip, config.state_port)?;

        let mut client = Self {
            control: DatagramChannel::bind_ephemeral()?,
            state: DatagramChannel::bind_ephemeral()?,
            route: Route::Direct {
                control_dest,
                state_dest,
            },
            keepalive: KeepaliveTimer::new(config.relay_keepalive_secs),
            poller: None,
        };
        client.send_hello();
        Ok(client)
    }

    /// Join through a relay. Registers on the state lane right away so
    /// forwarded snapshots have somewhere to go.
    pub fn relay(
        lobby_id: String,
        control_addr: SocketAddr,
        state_addr: SocketAddr,
        config: &NetworkConfig,
    ) -> Result<Self, JoinError> {
        let mut client = Self {
            control: DatagramChannel::bind_ephemeral()?,
            state: DatagramChannel::bind_ephemeral()?,
            route: Route::Relay {
                lobby_id,
                control_addr,
                state_addr,
            },
            keepalive: KeepaliveTimer::new(config.relay_keepalive_secs),
            poller: None,
        };
        client.send_relay_register();
        Ok(client)
    }

    /// Join in P2P mode. The channels are bound by the caller before the
    /// room join so the advertised ports match reality.
    pub fn p2p(
        control: DatagramChannel,
        state: DatagramChannel,
        control_candidates: Vec<SocketAddr>,
        state_candidates: Vec<SocketAddr>,
        poller: RendezvousPoller,
        config: &NetworkConfig,
    ) -> Self {
        let mut client = Self {
            control,
            state,
            route: Route::P2p {
                control_candidates,
                state_candidates,
            },
            keepalive: KeepaliveTimer::new(config.relay_keepalive_secs),
            poller: Some(poller),
        };
        client.send_hello();
        client
    }

    /// The port the control channel actually bound to.
    pub fn control_port(&self) -> u16 {
        self.control.local_port()
    }

    /// The port the state channel actually bound to.
    pub fn state_port(&self) -> u16 {
        self.state.local_port()
    }

    /// Register with the host's state port as a snapshot recipient.
    pub fn send_hello(&mut self) {
        let dests: Vec<SocketAddr> = match &self.route {
            Route::Direct { state_dest, .. } => vec![*state_dest],
            Route::Relay { .. } => Vec::new(),
            Route::P2p {
                state_candidates, ..
            } => state_candidates.clone(),
        };
        for dest in dests {
            if let Err(e) = self.state.try_send(HELLO, dest) {
                tracing::debug!("Hello to {} failed: {}", dest, e);
            }
        }
    }

    /// Send this tick's input sample toward the host.
    pub fn send_input(&mut self, sample: &InputSample) {
        let (encoded, dests): (_, Vec<SocketAddr>) = match &self.route {
            Route::Direct { control_dest, .. } => {
                (protocol::encode_input(sample), vec![*control_dest])
            }
            Route::Relay {
                lobby_id,
                control_addr,
                ..
            } => (
                RelayEnvelope::control(lobby_id, sample).and_then(|env| env.encode()),
                vec![*control_addr],
            ),
            Route::P2p {
                control_candidates, ..
            } => (protocol::encode_input(sample), control_candidates.clone()),
        };

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping input send: {}", e);
                return;
            }
        };
        for dest in dests {
            if let Err(e) = self.control.try_send(&bytes, dest) {
                tracing::debug!("Input send to {} failed: {}", dest, e);
            }
        }
    }

    /// Drain the state socket and return the newest well-formed
    /// snapshot, if any arrived since the last call. Malformed datagrams
    /// are discarded silently.
    pub fn poll_snapshot(&mut self) -> Option<StateSnapshot> {
        let relayed = matches!(self.route, Route::Relay { .. });
        let mut buf = [0u8; protocol::MAX_SNAPSHOT_SIZE];
        let mut latest = None;

        while let Some((len, addr)) = self.state.try_recv(&mut buf) {
            let decoded = if relayed {
                RelayEnvelope::decode(&buf[..len]).and_then(|env| env.snapshot())
            } else {
                protocol::decode_snapshot(&buf[..len])
            };
            match decoded {
                Ok(snapshot) => latest = Some(snapshot),
                Err(e) => tracing::debug!("Dropping malformed snapshot from {}: {}", addr, e),
            }
        }
        latest
    }

    /// Advance the periodic work: relay re-registration, and in P2P mode
    /// wholesale replacement of the candidate sets from the poller.
    pub fn tick(&mut self, dt: f32) {
        if matches!(self.route, Route::Relay { .. }) {
            if self.keepalive.tick(dt) {
                self.send_relay_register();
            }
        } else if let Some(room) = self.poller.as_ref().and_then(|p| p.try_take()) {
            if let Route::P2p {
                control_candidates,
                state_candidates,
            } = &mut self.route
            {
                *control_candidates = room.host_control_candidates();
                *state_candidates = room.host_state_candidates();
            }
        }
    }

    fn send_relay_register(&mut self) {
        if let Route::Relay {
            lobby_id,
            state_addr,
            ..
        } = &self.route
        {
            // Register on the state lane so the relay knows where to
            // forward host snapshots.
            let env = RelayEnvelope::register(lobby_id, RelayRole::Client, RelayKind::State);
            match env.encode() {
                Ok(bytes) => {
                    if let Err(e) = self.state.try_send(&bytes, *state_addr) {
                        tracing::debug!("Relay registration send failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Relay registration encode failed: {}", e),
            }
        }
    }
}

fn parse_dest(host: &str, port: u16) -> Result<SocketAddr, JoinError> {
    super::transport::resolve_addr(host, port).ok_or_else(|| JoinError::BadAddress(host.to_string()))
}

/// Errors setting up a join. Transient conditions after setup never
/// produce errors; they degrade to stale state.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("Invalid host address: {0}")]
    BadAddress(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
