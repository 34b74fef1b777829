//! Session state machine.
//!
//! Drives the process through menu/selection/connecting/playing phases
//! and picks the transport strategy. Every directory-service failure is
//! caught here and turned into a short user-visible status string that
//! leaves the session exactly where it was; nothing throws past this
//! boundary.

use super::channel::DatagramChannel;
use super::client::JoinClient;
use super::host::HostNetwork;
use super::lobby::{
    CreateLobbyRequest, CreateRoomRequest, JoinRoomRequest, LobbyClient,
};
use super::transport::RendezvousPoller;
use super::NetworkConfig;

/// UI phase of the session. `Menu` is initial; there is no terminal
/// phase, as the process loops until externally told to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Menu,
    HostSelect,
    JoinMenu,
    HostOnline,
    JoinOnline,
    HostP2p,
    JoinP2p,
    Playing,
}

/// Owns the phase, the last user-visible status line, and the live host
/// network context while playing.
pub struct SessionDriver {
    config: NetworkConfig,
    lobby: LobbyClient,
    phase: SessionPhase,
    status: String,
    host: Option<HostNetwork>,
}

impl SessionDriver {
    /// Create a driver in the menu phase.
    pub fn new(config: NetworkConfig) -> Self {
        let lobby = LobbyClient::new(config.lobby_base_url.clone());
        Self {
            config,
            lobby,
            phase: SessionPhase::Menu,
            status: String::new(),
            host: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Last user-visible status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The live host network context while hosting a duel.
    pub fn host_network(&mut self) -> Option<&mut HostNetwork> {
        self.host.as_mut()
    }

    /// Open one of the configuration sub-menus from the main menu.
    pub fn open(&mut self, phase: SessionPhase) {
        if self.phase == SessionPhase::Menu
            && matches!(
                phase,
                SessionPhase::HostSelect
                    | SessionPhase::JoinMenu
                    | SessionPhase::HostOnline
                    | SessionPhase::JoinOnline
                    | SessionPhase::HostP2p
                    | SessionPhase::JoinP2p
            )
        {
            self.phase = phase;
            self.status.clear();
        }
    }

    /// Escape / win / forfeit: tear down any live network context and
    /// return to the menu.
    pub fn return_to_menu(&mut self) {
        if self.host.take().is_some() {
            tracing::info!("Session network context torn down");
        }
        self.phase = SessionPhase::Menu;
    }

    /// HostSelect -> Playing: bind the two fixed ports and broadcast to
    /// whichever spectators register.
    pub fn start_direct_host(&mut self) {
        if self.phase != SessionPhase::HostSelect {
            return;
        }
        match HostNetwork::direct(&self.config) {
            Ok(host) => {
                self.status = format!(
                    "Hosting on ports {}/{}",
                    host.control_port(),
                    host.state_port()
                );
                self.host = Some(host);
                self.phase = SessionPhase::Playing;
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    /// JoinMenu -> joining loop: connect straight to a typed host IP.
    /// The returned client runs its own receive/send/reconcile cycle;
    /// call [`return_to_menu`](Self::return_to_menu) when it exits.
    pub fn join_direct(&mut self, host_ip: &str) -> Option<JoinClient> {
        if self.phase != SessionPhase::JoinMenu {
            return None;
        }
        match JoinClient::direct(host_ip, &self.config) {
            Ok(client) => {
                self.status = format!("Joined {}", host_ip);
                Some(client)
            }
            Err(e) => {
                self.status = e.to_string();
                None
            }
        }
    }

    /// HostOnline -> Playing: create a lobby record advertising the
    /// typed IP. Relay-assisted if the directory returned a relay
    /// endpoint, direct otherwise.
    pub fn host_online(&mut self, advertised_ip: &str, host_choice: &str) {
        if self.phase != SessionPhase::HostOnline {
            return;
        }

        let request = CreateLobbyRequest {
            host_ip: advertised_ip.to_string(),
            control_port: self.config.control_port,
            state_port: self.config.state_port,
            host_choice: host_choice.to_string(),
        };
        let info = match self.lobby.create_lobby(&request) {
            Ok(info) => info,
            Err(e) => {
                self.status = e.to_string();
                return;
            }
        };

        let lobby_id = info.id.clone().unwrap_or_default();
        let built = match &info.relay_host {
            Some(relay_host) => {
                let control_addr = super::transport::resolve_addr(
                    relay_host,
                    info.relay_control_port.unwrap_or(self.config.relay_control_port),
                );
                let state_addr = super::transport::resolve_addr(
                    relay_host,
                    info.relay_state_port.unwrap_or(self.config.relay_state_port),
                );
                match (control_addr, state_addr) {
                    (Some(control_addr), Some(state_addr)) => HostNetwork::relay(
                        &self.config,
                        lobby_id.clone(),
                        control_addr,
                        state_addr,
                    )
                    .map_err(|e| e.to_string()),
                    _ => Err(format!("Unusable relay address: {}", relay_host)),
                }
            }
            None => HostNetwork::direct(&self.config).map_err(|e| e.to_string()),
        };

        match built {
            Ok(host) => {
                self.status = format!("Lobby {} open", lobby_id);
                self.host = Some(host);
                self.phase = SessionPhase::Playing;
            }
            Err(msg) => self.status = msg,
        }
    }

    /// JoinOnline: look up a lobby code. On success the returned client
    /// runs as its own joining loop; on any directory failure the phase
    /// is unchanged, the status carries the message, and no further
    /// network calls happen until the user retries.
    pub fn join_online(&mut self, code: &str) -> Option<JoinClient> {
        if self.phase != SessionPhase::JoinOnline {
            return None;
        }

        let info = match self.lobby.get_lobby(code) {
            Ok(info) => info,
            Err(e) => {
                self.status = e.to_string();
                return None;
            }
        };

        let built = match &info.relay_host {
            Some(relay_host) => {
                let control_addr = super::transport::resolve_addr(
                    relay_host,
                    info.relay_control_port.unwrap_or(self.config.relay_control_port),
                );
                let state_addr = super::transport::resolve_addr(
                    relay_host,
                    info.relay_state_port.unwrap_or(self.config.relay_state_port),
                );
                match (control_addr, state_addr) {
                    (Some(control_addr), Some(state_addr)) => {
                        JoinClient::relay(code.to_string(), control_addr, state_addr, &self.config)
                    }
                    _ => {
                        self.status = format!("Unusable relay address: {}", relay_host);
                        return None;
                    }
                }
            }
            None => match &info.host_ip {
                Some(host_ip) => JoinClient::direct(host_ip, &self.config),
                None => {
                    self.status = "Lobby record has no host address".to_string();
                    return None;
                }
            },
        };

        match built {
            Ok(client) => {
                self.status = format!("Joined lobby {}", code);
                Some(client)
            }
            Err(e) => {
                self.status = e.to_string();
                None
            }
        }
    }

    /// HostP2p -> Playing: bind first so the advertised ports match the
    /// sockets, create a rendezvous room, and start the candidate poll.
    pub fn host_p2p(&mut self, host_choice: &str, local_ip: &str) {
        if self.phase != SessionPhase::HostP2p {
            return;
        }

        let (control, state) = match (
            DatagramChannel::bind_or_ephemeral(self.config.control_port),
            DatagramChannel::bind_or_ephemeral(self.config.state_port),
        ) {
            (Ok(control), Ok(state)) => (control, state),
            (Err(e), _) | (_, Err(e)) => {
                self.status = e.to_string();
                return;
            }
        };

        let request = CreateRoomRequest {
            host_choice: host_choice.to_string(),
            host_control_port: control.local_port(),
            host_state_port: state.local_port(),
            host_local_ip: local_ip.to_string(),
        };
        match self.lobby.create_room(&request) {
            Ok(created) => {
                let poller = RendezvousPoller::spawn(
                    LobbyClient::new(self.config.lobby_base_url.clone()),
                    created.id.clone(),
                    self.config.rendezvous_poll_interval(),
                );
                self.status = format!("Room {} open", created.id);
                self.host = Some(HostNetwork::p2p(
                    control,
                    state,
                    created.id,
                    poller,
                    &self.config,
                ));
                self.phase = SessionPhase::Playing;
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    /// JoinP2p: bind, register this side's endpoints with the room, and
    /// race the host's candidates from the first `GET /rooms/{code}`.
    pub fn join_p2p(&mut self, code: &str, local_ip: &str) -> Option<JoinClient> {
        if self.phase != SessionPhase::JoinP2p {
            return None;
        }

        let (control, state) = match (
            DatagramChannel::bind_ephemeral(),
            DatagramChannel::bind_ephemeral(),
        ) {
            (Ok(control), Ok(state)) => (control, state),
            (Err(e), _) | (_, Err(e)) => {
                self.status = e.to_string();
                return None;
            }
        };

        let request = JoinRoomRequest {
            client_control_port: control.local_port(),
            client_state_port: state.local_port(),
            client_local_ip: local_ip.to_string(),
        };
        if let Err(e) = self.lobby.join_room(code, &request) {
            self.status = e.to_string();
            return None;
        }

        let room = match self.lobby.get_room(code) {
            Ok(room) => room,
            Err(e) => {
                self.status = e.to_string();
                return None;
            }
        };

        let poller = RendezvousPoller::spawn(
            LobbyClient::new(self.config.lobby_base_url.clone()),
            code.to_string(),
            self.config.rendezvous_poll_interval(),
        );
        self.status = format!("Joined room {}", code);
        Some(JoinClient::p2p(
            control,
            state,
            room.host_control_candidates(),
            room.host_state_candidates(),
            poller,
            &self.config,
        ))
    }
}
