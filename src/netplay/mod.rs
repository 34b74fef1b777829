//! Netplay for the 7KOR 1v1 duel.
//!
//! One host process runs the authoritative simulation; a joining
//! participant and any number of passive spectators stay visually
//! consistent with it over unreliable datagrams. Transports: direct to a
//! known IP, relay-assisted through a blind forwarder, or P2P with
//! candidate endpoints exchanged via a rendezvous service.
//!
//! Everything is built on non-blocking polls from the game's tick loop;
//! only directory HTTP calls run elsewhere (menu transitions and the
//! rendezvous poll worker).

pub mod channel;
pub mod client;
pub mod host;
pub mod keepalive;
pub mod lobby;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod transport;

use std::time::Duration;

// Re-export commonly used types
pub use channel::{ChannelError, DatagramChannel};
pub use client::{JoinClient, JoinError};
pub use host::HostNetwork;
pub use lobby::{LobbyClient, LobbyError, RoomInfo};
pub use protocol::{CodecError, InputSample, StateSnapshot};
pub use reconcile::{reconcile, DisplayMode, Mirror, PlayerKind};
pub use session::{SessionDriver, SessionPhase};
pub use transport::{RendezvousPoller, Transport};

/// Network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Well-known port for client -> host control input.
    pub control_port: u16,
    /// Well-known port for host -> clients state snapshots.
    pub state_port: u16,
    /// Relay's control-lane port.
    pub relay_control_port: u16,
    /// Relay's state-lane port.
    pub relay_state_port: u16,
    /// Base URL of the lobby / rendezvous directory service.
    pub lobby_base_url: String,
    /// Relay re-registration period in seconds.
    pub relay_keepalive_secs: f32,
    /// Rendezvous candidate poll period in seconds.
    pub rendezvous_poll_secs: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            control_port: 50007,
            state_port: 50008,
            relay_control_port: 51007,
            relay_state_port: 51008,
            lobby_base_url: "http://127.0.0.1:8000".to_string(),
            relay_keepalive_secs: 1.5,
            rendezvous_poll_secs: 2.0,
        }
    }
}

impl NetworkConfig {
    /// Create a new network configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendezvous poll period as a `Duration`.
    pub fn rendezvous_poll_interval(&self) -> Duration {
        Duration::from_secs_f32(self.rendezvous_poll_secs)
    }
}
