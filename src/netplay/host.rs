//! Host-side networking: input intake, spectator registration and the
//! per-tick state broadcast.
//!
//! The host owns the authoritative simulation; this module owns its two
//! sockets and its destination lists. Everything here is a non-blocking
//! poll driven from the host's tick loop.

use std::net::SocketAddr;

use super::channel::{ChannelError, DatagramChannel};
use super::keepalive::KeepaliveTimer;
use super::protocol::{
    self, InputSample, RelayEnvelope, RelayKind, RelayRole, StateSnapshot,
};
use super::transport::{RendezvousPoller, Transport};
use super::NetworkConfig;

/// The host's network context: sockets, target lists and timers.
///
/// Created when the session enters a Playing-adjacent state, dropped on
/// return to the menu.
pub struct HostNetwork {
    control: DatagramChannel,
    state: DatagramChannel,
    transport: Transport,
    /// Addresses that registered by sending any datagram to the state
    /// port. Never expired on silence; pruned only on a send error.
    spectators: Vec<SocketAddr>,
    /// P2P candidate set, replaced wholesale by each rendezvous poll.
    peer_targets: Vec<SocketAddr>,
    last_remote_input: Option<InputSample>,
    keepalive: KeepaliveTimer,
    poller: Option<RendezvousPoller>,
}

impl HostNetwork {
    /// Host with a directly reachable address: bind the two well-known
    /// ports. These ports are the public contract, so a bind failure is
    /// surfaced to the caller instead of falling back.
    pub fn direct(config: &NetworkConfig) -> Result<Self, ChannelError> {
        let control = DatagramChannel::bind(config.control_port)?;
        let state = DatagramChannel::bind(config.state_port)?;
        Ok(Self::with_transport(control, state, Transport::Direct, config))
    }

    /// Host behind a blind-forwarding relay. The local port numbers are
    /// not contractual here; the relay learns the host's address from
    /// its registration datagrams.
    pub fn relay(
        config: &NetworkConfig,
        lobby_id: String,
        control_addr: SocketAddr,
        state_addr: SocketAddr,
    ) -> Result<Self, ChannelError> {
        let control = DatagramChannel::bind_or_ephemeral(config.control_port)?;
        let state = DatagramChannel::bind_or_ephemeral(config.state_port)?;
        let mut host = Self::with_transport(
            control,
            state,
            Transport::Relay {
                lobby_id,
                control_addr,
                state_addr,
            },
            config,
        );
        // Register immediately rather than waiting out the first interval.
        host.send_relay_register();
        Ok(host)
    }

    /// Host in P2P mode. The channels are bound by the caller before the
    /// room is created so the advertised ports match reality; the poller
    /// keeps the candidate set fresh.
    pub fn p2p(
        control: DatagramChannel,
        state: DatagramChannel,
        room_code: String,
        poller: RendezvousPoller,
        config: &NetworkConfig,
    ) -> Self {
        let mut host = Self::with_transport(
            control,
            state,
            Transport::P2p { room_code },
            config,
        );
        host.poller = Some(poller);
        host
    }

    fn with_transport(
        control: DatagramChannel,
        state: DatagramChannel,
        transport: Transport,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            control,
            state,
            transport,
            spectators: Vec::new(),
            peer_targets: Vec::new(),
            last_remote_input: None,
            keepalive: KeepaliveTimer::new(config.relay_keepalive_secs),
            poller: None,
        }
    }

    /// The port the control channel actually bound to.
    pub fn control_port(&self) -> u16 {
        self.control.local_port()
    }

    /// The port the state channel actually bound to.
    pub fn state_port(&self) -> u16 {
        self.state.local_port()
    }

    /// Drain the control channel; the last well-formed sample replaces
    /// the remembered remote input. Samples never name a character; the
    /// remote participant's slot is fixed by session configuration.
    pub fn poll_remote_input(&mut self) {
        let mut buf = [0u8; protocol::MAX_INPUT_SIZE];
        while let Some((len, addr)) = self.control.try_recv(&mut buf) {
            let decoded = match &self.transport {
                Transport::Relay { .. } => RelayEnvelope::decode(&buf[..len])
                    .and_then(|env| env.input()),
                _ => protocol::decode_input(&buf[..len]),
            };
            match decoded {
                Ok(sample) => self.last_remote_input = Some(sample),
                Err(e) => tracing::debug!("Dropping malformed control datagram from {}: {}", addr, e),
            }
        }
    }

    /// The most recent remote participant input, if any has arrived.
    pub fn last_remote_input(&self) -> Option<&InputSample> {
        self.last_remote_input.as_ref()
    }

    /// Drain the state channel; any sender becomes a broadcast target.
    /// Registration is at-most-once and duplicate hellos are harmless.
    pub fn poll_registrations(&mut self) {
        let mut buf = [0u8; 512];
        while let Some((_, addr)) = self.state.try_recv(&mut buf) {
            if !self.spectators.contains(&addr) {
                tracing::info!("Spectator registered from {}", addr);
                self.spectators.push(addr);
            }
        }
    }

    /// Advance the periodic work: relay re-registration and, in P2P
    /// mode, draining the rendezvous poller into the candidate set.
    pub fn tick(&mut self, dt: f32) {
        if matches!(self.transport, Transport::Relay { .. }) {
            if self.keepalive.tick(dt) {
                self.send_relay_register();
            }
        } else if matches!(self.transport, Transport::P2p { .. }) {
            if let Some(room) = self.poller.as_ref().and_then(|p| p.try_take()) {
                self.replace_peer_targets(room.client_state_candidates());
            }
        }
    }

    /// Replace the P2P candidate set wholesale. No incremental merge: a
    /// few seconds of staleness is traded for never mixing two polls.
    pub fn replace_peer_targets(&mut self, targets: Vec<SocketAddr>) {
        self.peer_targets = targets;
    }

    /// Current broadcast targets, transport destinations first.
    pub fn targets(&self) -> Vec<SocketAddr> {
        match &self.transport {
            Transport::Direct => self.spectators.clone(),
            Transport::Relay { state_addr, .. } => vec![*state_addr],
            Transport::P2p { .. } => {
                let mut targets = self.peer_targets.clone();
                targets.extend(self.spectators.iter().copied());
                targets
            }
        }
    }

    /// Encode the snapshot once and push it to every target.
    pub fn broadcast(&mut self, snapshot: &StateSnapshot) {
        enum Plan {
            Spectators,
            RelaySingle(SocketAddr),
            Race,
        }

        let (encoded, plan) = match &self.transport {
            Transport::Direct => (protocol::encode_snapshot(snapshot), Plan::Spectators),
            Transport::Relay {
                lobby_id,
                state_addr,
                ..
            } => (
                RelayEnvelope::state(lobby_id, snapshot).and_then(|env| env.encode()),
                Plan::RelaySingle(*state_addr),
            ),
            Transport::P2p { .. } => (protocol::encode_snapshot(snapshot), Plan::Race),
        };

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping snapshot broadcast: {}", e);
                return;
            }
        };

        match plan {
            Plan::Spectators => self.send_pruning_spectators(&bytes),
            Plan::RelaySingle(state_addr) => {
                if let Err(e) = self.state.try_send(&bytes, state_addr) {
                    tracing::debug!("Relay state send failed: {}", e);
                }
            }
            Plan::Race => {
                // Address racing: every candidate, every tick. Whichever
                // endpoint actually reaches the peer wins by arrival.
                for dest in self.peer_targets.clone() {
                    if let Err(e) = self.state.try_send(&bytes, dest) {
                        tracing::debug!("P2P candidate send failed: {}", e);
                    }
                }
                self.send_pruning_spectators(&bytes);
            }
        }
    }

    fn send_pruning_spectators(&mut self, bytes: &[u8]) {
        let mut dead = Vec::new();
        for dest in &self.spectators {
            if let Err(e) = self.state.try_send(bytes, *dest) {
                tracing::debug!("Dropping spectator {}: {}", dest, e);
                dead.push(*dest);
            }
        }
        if !dead.is_empty() {
            self.spectators.retain(|a| !dead.contains(a));
        }
    }

    fn send_relay_register(&mut self) {
        if let Transport::Relay {
            lobby_id,
            control_addr,
            ..
        } = &self.transport
        {
            // Register on the control lane so the relay knows where to
            // forward client inputs.
            let env = RelayEnvelope::register(lobby_id, RelayRole::Host, RelayKind::Control);
            match env.encode() {
                Ok(bytes) => {
                    if let Err(e) = self.control.try_send(&bytes, *control_addr) {
                        tracing::debug!("Relay registration send failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Relay registration encode failed: {}", e),
            }
        }
    }
}
