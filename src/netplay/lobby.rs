//! HTTP client for the external lobby / rendezvous directory.
//!
//! Thin consumer of the directory service's request/response contract.
//! All calls are blocking and run on whatever thread owns the client;
//! the session layer keeps them off the per-tick broadcast path by
//! calling from menu transitions or from the rendezvous poll worker.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Request timeout for directory calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Body for `POST /lobbies`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateLobbyRequest {
    pub host_ip: String,
    pub control_port: u16,
    pub state_port: u16,
    pub host_choice: String,
}

/// A lobby record as returned by the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct LobbyInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub relay_host: Option<String>,
    #[serde(default)]
    pub relay_control_port: Option<u16>,
    #[serde(default)]
    pub relay_state_port: Option<u16>,
}

/// Body for `POST /rooms`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomRequest {
    pub host_choice: String,
    pub host_control_port: u16,
    pub host_state_port: u16,
    pub host_local_ip: String,
}

/// Response to `POST /rooms`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomCreated {
    pub id: String,
}

/// Body for `POST /rooms/{code}/join`.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRoomRequest {
    pub client_control_port: u16,
    pub client_state_port: u16,
    pub client_local_ip: String,
}

/// A rendezvous room record: both parties' endpoint candidates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomInfo {
    pub host_public_ip: String,
    pub host_control_port: u16,
    pub host_state_port: u16,
    #[serde(default)]
    pub host_local_ip: Option<String>,
    #[serde(default)]
    pub host_local_control_port: Option<u16>,
    #[serde(default)]
    pub host_local_state_port: Option<u16>,
    #[serde(default)]
    pub client_public_ip: Option<String>,
    #[serde(default)]
    pub client_local_ip: Option<String>,
    #[serde(default)]
    pub client_control_port: Option<u16>,
    #[serde(default)]
    pub client_state_port: Option<u16>,
}

fn parse_addr(ip: &str, port: u16) -> Option<SocketAddr> {
    format!("{}:{}", ip, port).parse().ok()
}

impl RoomInfo {
    /// Candidate addresses for reaching the host's control port.
    ///
    /// Public and local-network endpoints; the sender races all of them
    /// every tick because it has no connectivity test.
    pub fn host_control_candidates(&self) -> Vec<SocketAddr> {
        let mut candidates = Vec::new();
        candidates.extend(parse_addr(&self.host_public_ip, self.host_control_port));
        if let (Some(ip), Some(port)) = (&self.host_local_ip, self.host_local_control_port) {
            candidates.extend(parse_addr(ip, port));
        }
        candidates.dedup();
        candidates
    }

    /// Candidate addresses for reaching the host's state port.
    pub fn host_state_candidates(&self) -> Vec<SocketAddr> {
        let mut candidates = Vec::new();
        candidates.extend(parse_addr(&self.host_public_ip, self.host_state_port));
        if let (Some(ip), Some(port)) = (&self.host_local_ip, self.host_local_state_port) {
            candidates.extend(parse_addr(ip, port));
        }
        candidates.dedup();
        candidates
    }

    /// Candidate addresses for reaching the joining client's state port.
    /// Empty until the client has joined the room.
    pub fn client_state_candidates(&self) -> Vec<SocketAddr> {
        let mut candidates = Vec::new();
        if let Some(port) = self.client_state_port {
            if let Some(ip) = &self.client_public_ip {
                candidates.extend(parse_addr(ip, port));
            }
            if let Some(ip) = &self.client_local_ip {
                candidates.extend(parse_addr(ip, port));
            }
        }
        candidates.dedup();
        candidates
    }
}

/// Blocking HTTP client for the lobby / rendezvous directory.
pub struct LobbyClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl LobbyClient {
    /// Create a client against the given directory base URL.
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, HTTP_TIMEOUT)
    }

    /// Create a client with a non-default request timeout.
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { http, base_url }
    }

    /// `POST /lobbies`: register a hosted duel with the directory.
    pub fn create_lobby(&self, req: &CreateLobbyRequest) -> Result<LobbyInfo, LobbyError> {
        self.post("/lobbies", req)
    }

    /// `GET /lobbies/{code}`: look up a lobby by its short code.
    pub fn get_lobby(&self, code: &str) -> Result<LobbyInfo, LobbyError> {
        self.get(&format!("/lobbies/{}", code))
    }

    /// `POST /rooms`: open a P2P rendezvous room as host.
    pub fn create_room(&self, req: &CreateRoomRequest) -> Result<RoomCreated, LobbyError> {
        self.post("/rooms", req)
    }

    /// `POST /rooms/{code}/join`: register the joining side's endpoints.
    pub fn join_room(&self, code: &str, req: &JoinRoomRequest) -> Result<(), LobbyError> {
        let url = format!("{}/rooms/{}/join", self.base_url, code);
        let response = self.http.post(&url).json(req).send().map_err(map_transport)?;
        check_status(response.status())?;
        Ok(())
    }

    /// `GET /rooms/{code}`: fetch the latest endpoint candidates.
    pub fn get_room(&self, code: &str) -> Result<RoomInfo, LobbyError> {
        self.get(&format!("/rooms/{}", code))
    }

    fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, LobbyError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().map_err(map_transport)?;
        check_status(response.status())?;
        response
            .json()
            .map_err(|e| LobbyError::BadResponse(e.to_string()))
    }

    fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, LobbyError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().map_err(map_transport)?;
        check_status(response.status())?;
        response
            .json()
            .map_err(|e| LobbyError::BadResponse(e.to_string()))
    }
}

fn map_transport(e: reqwest::Error) -> LobbyError {
    if e.is_timeout() {
        LobbyError::Timeout
    } else {
        LobbyError::Unreachable(e.to_string())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), LobbyError> {
    if status == reqwest::StatusCode::NOT_FOUND {
        Err(LobbyError::NotFound)
    } else if !status.is_success() {
        Err(LobbyError::Http(status.as_u16()))
    } else {
        Ok(())
    }
}

/// Directory-service errors. Each `Display` string doubles as the
/// user-visible status line; none of these propagate past the session
/// layer and none trigger an automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found (it may have expired)")]
    NotFound,

    #[error("Lobby service timed out")]
    Timeout,

    #[error("Could not reach the lobby service: {0}")]
    Unreachable(String),

    #[error("Lobby service error (HTTP {0})")]
    Http(u16),

    #[error("Unexpected lobby service response: {0}")]
    BadResponse(String),
}
