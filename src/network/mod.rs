//! ## Network module
//!
//! Everything that touches a socket. The module only deals in opaque identity strings
//! and timestamps, it never interprets who a peer is.
//!
//! ## Sub-modules
//! - [bcast]: UDP broadcast socket with receive deadline
//! - [peers]: Heartbeat transmitter and receiver, and the [peers::PeerDelta] they produce
//! - [scanner]: One receiver per port in a range, merged into a single channel

pub mod bcast;
pub mod peers;
pub mod scanner;
