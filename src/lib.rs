#![warn(missing_docs)]
//! # This projects library
//!
//! This library lets independently running elevator controllers discover each other over
//! UDP broadcast heartbeats, detect when one of them disappears, and fold those events
//! into a shared map of elevator states.
//!
//! ## Overview
//! - **config**: Configuration constants and the per-node [config::PeerConfig].
//! - **utils**: Shutdown signalling shared by all tasks.
//! - **init**: Argument parsing and startup.
//! - **print**: Colored terminal logging.
//! - **network**: Broadcast transport, heartbeat transmitter/receiver and the port scanner.
//! - **peer_watch**: Failure detector and reconciler turning peer events into state changes.
//! - **world_view**: The elevator map, its owner task and the state change messages.

pub mod config;

pub mod utils;

pub mod init;

pub mod print;

pub mod network;

pub mod peer_watch;

pub mod world_view;
