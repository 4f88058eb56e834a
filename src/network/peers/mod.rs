//! ## Heartbeat peers
//!
//! Each node periodically broadcasts its identity ([transmitter]). Receivers ([receiver])
//! listen on a port, remember when every identity was last heard and report arrivals and
//! timeouts as [PeerDelta]s.
//!
//! The wire format is the identity as raw UTF-8 bytes, one identity per datagram.
//! No header, no length prefix, no checksum.

pub mod liveness;
pub mod receiver;
pub mod transmitter;

pub use receiver::start_peer_receiver;
pub use transmitter::start_peer_transmitter;


/// What changed on one listening port during one receive cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerDelta {
    /// Every identity still alive after this cycle, sorted
    pub peers: Vec<String>,
    /// Identity heard for the first time this cycle
    pub new: Option<String>,
    /// Identities that timed out this cycle, sorted
    pub lost: Vec<String>,
}
