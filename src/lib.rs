//! korduel - Netplay for the 7KOR 1v1 duel.
//!
//! Host-authoritative real-time state sync over unreliable datagrams,
//! with direct, relay-assisted and P2P (NAT-traversal-assisted)
//! transports. Rendering, combat rules and the lobby directory server
//! live elsewhere; this crate exchanges plain-data snapshots and input
//! samples with them.

pub mod netplay;

// Re-export commonly used types
pub use netplay::protocol::{InputSample, StateSnapshot};
pub use netplay::reconcile::{reconcile, Mirror};
pub use netplay::session::{SessionDriver, SessionPhase};
pub use netplay::NetworkConfig;
