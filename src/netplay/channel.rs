//! Non-blocking UDP channel for netplay datagrams.
//!
//! One socket wrapper used in two roles: the control channel
//! (client -> host inputs) and the state channel (host -> clients and
//! spectators). No retries, no ordering, no fragmentation; payloads must
//! stay under the codec size caps.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

/// A non-blocking datagram socket bound to one local port.
pub struct DatagramChannel {
    socket: UdpSocket,
}

impl DatagramChannel {
    /// Bind to the exact local port on all interfaces.
    ///
    /// `AddressInUse` is non-fatal for any socket whose exact port number
    /// is not part of the public contract; such callers fall back to
    /// [`bind_ephemeral`](Self::bind_ephemeral).
    pub fn bind(port: u16) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(|e| {
            if e.kind() == ErrorKind::AddrInUse {
                ChannelError::AddressInUse(port)
            } else {
                ChannelError::BindFailed(e.to_string())
            }
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ChannelError::BindFailed(e.to_string()))?;
        Ok(Self { socket })
    }

    /// Bind to an OS-assigned ephemeral port.
    pub fn bind_ephemeral() -> Result<Self, ChannelError> {
        Self::bind(0)
    }

    /// Bind to the exact port, falling back to an ephemeral one if it is
    /// already taken.
    pub fn bind_or_ephemeral(port: u16) -> Result<Self, ChannelError> {
        match Self::bind(port) {
            Ok(channel) => Ok(channel),
            Err(ChannelError::AddressInUse(_)) => {
                tracing::warn!("Port {} in use, falling back to an ephemeral port", port);
                Self::bind_ephemeral()
            }
            Err(e) => Err(e),
        }
    }

    /// The local port this channel is actually bound to.
    pub fn local_port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Best-effort send of one datagram.
    ///
    /// An error means the destination looked unreachable for this send;
    /// callers holding a target list prune the destination and move on.
    pub fn try_send(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), ChannelError> {
        match self.socket.send_to(bytes, dest) {
            Ok(_) => Ok(()),
            // A full send buffer is transient, not a dead destination.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(ChannelError::SendFailed {
                dest,
                reason: e.to_string(),
            }),
        }
    }

    /// Non-blocking receive of one datagram.
    ///
    /// Returns `None` immediately when nothing is queued. This is the
    /// single suspension-free polling primitive the tick loop is built on.
    pub fn try_recv(&self, buf: &mut [u8]) -> Option<(usize, SocketAddr)> {
        match self.socket.recv_from(buf) {
            Ok((len, addr)) => Some((len, addr)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                // e.g. ICMP-induced ConnectionReset; nothing to deliver.
                tracing::debug!("UDP receive error: {}", e);
                None
            }
        }
    }
}

/// Datagram channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Port {0} is already in use")]
    AddressInUse(u16),

    #[error("Failed to bind: {0}")]
    BindFailed(String),

    #[error("Failed to send to {dest}: {reason}")]
    SendFailed { dest: SocketAddr, reason: String },
}
