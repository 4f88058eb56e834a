//! # config.rs – Centralized Parameter Store
//!
//! This module holds all static program parameters used throughout the system,
//! and the [PeerConfig] struct which bundles the tunable ones for a running node.
//!
//! Defaults live here as constants. A node may override them with a JSON file,
//! see [PeerConfig::from_json_file].

use std::fs;
use std::net::Ipv4Addr;
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{ensure, Context};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::peer_watch::registry::PeerRegistry;

//
// ──────────────────────────────────────────────────────────────
//   1. NETWORK SETTINGS
// ──────────────────────────────────────────────────────────────
//

/// Broadcast address used for heartbeats
pub static BC_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// UDP listen address (bind address)
pub static BC_LISTEN_ADDR: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// First port in the scanned heartbeat range (inclusive)
pub const SCAN_PORT_START: u16 = 20010;

/// Last port in the scanned heartbeat range (exclusive)
pub const SCAN_PORT_END: u16 = 20100;

/// Size of the heartbeat receive buffer in bytes
pub const HEARTBEAT_BUFFER: usize = 1024;

//
// ──────────────────────────────────────────────────────────────
//   2. SYSTEM & ELEVATOR PARAMETERS
// ──────────────────────────────────────────────────────────────
//

/// Default number of elevators in the installation
pub const DEFAULT_NUM_ELEVATORS: usize = 3;

/// Identities broadcast by the default installation. Index is the elevator slot.
pub const DEFAULT_IDENTITIES: [&str; DEFAULT_NUM_ELEVATORS] = ["sendIDiszero", "sendIDisone", "sendIDistwo"];

/// Capacity of every mpsc channel between tasks
pub const CHANNEL_CAPACITY: usize = 100;

//
// ──────────────────────────────────────────────────────────────
//   3. TIMING & TIMEOUTS & INTERVALS
// ──────────────────────────────────────────────────────────────
//

/// Time between two heartbeats, and the longest a receiver waits for one
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Age of the last heartbeat before a peer is declared lost
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(500);

//
// ──────────────────────────────────────────────────────────────
//   4. LOGGING CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Enable/disable printing of elevator map updates
pub static PRINT_MAP_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of errors
pub static PRINT_ERR_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of warnings
pub static PRINT_WARN_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of success messages
pub static PRINT_OK_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of general info
pub static PRINT_INFO_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of peer deltas and ignored heartbeats
pub static PRINT_DEBUG_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));


/// Heartbeat timing shared by transmitter and receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Period between heartbeats, also the per-cycle receive deadline
    pub heartbeat_interval: Duration,
    /// Maximum age of a peer's last heartbeat
    pub liveness_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            liveness_timeout: LIVENESS_TIMEOUT,
        }
    }
}

/// Everything a node needs to take part in peer discovery.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Slot of this node in the elevator map
    pub self_slot: usize,
    /// Identity broadcast by this node
    pub identity: String,
    /// Port this node transmits its heartbeat on. Excluded from scanning.
    pub announce_port: u16,
    /// Ports scanned for heartbeats from other nodes
    pub scan_ports: Range<u16>,
    /// Address heartbeats are sent to
    pub broadcast_addr: Ipv4Addr,
    /// Heartbeat interval and liveness timeout
    pub timing: Timing,
    /// Number of elevators, i.e. the fixed length of the elevator map
    pub num_elevators: usize,
    /// Known identities and their slots
    pub registry: PeerRegistry,
}

impl PeerConfig {
    /// Creates the default configuration for the node in `self_slot`.
    ///
    /// The identity is looked up in the default registry, and the announce port
    /// is `SCAN_PORT_START + self_slot`.
    pub fn new(self_slot: usize) -> anyhow::Result<Self> {
        let registry = PeerRegistry::default();
        let identity = registry
            .identity_of(self_slot)
            .with_context(|| format!("No identity registered for slot {}", self_slot))?
            .to_string();

        let config = Self {
            self_slot,
            identity,
            announce_port: default_announce_port(self_slot)?,
            scan_ports: SCAN_PORT_START..SCAN_PORT_END,
            broadcast_addr: BC_ADDR,
            timing: Timing::default(),
            num_elevators: DEFAULT_NUM_ELEVATORS,
            registry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file and applies it on top of the defaults.
    ///
    /// Every field in the file is optional. Example:
    /// ```json
    /// {
    ///     "identities": ["sendIDiszero", "sendIDisone", "sendIDistwo", "sendIDisthree"],
    ///     "heartbeat_interval_ms": 50,
    ///     "liveness_timeout_ms": 300,
    ///     "scan_port_start": 20010,
    ///     "scan_port_end": 20020,
    ///     "broadcast_addr": "255.255.255.255"
    /// }
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P, self_slot: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&text, self_slot)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Same as [PeerConfig::from_json_file], from an in-memory string.
    pub fn from_json_str(text: &str, self_slot: usize) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_json::from_str(text).context("Failed to parse config JSON")?;

        let registry = match file.identities {
            Some(ids) => PeerRegistry::from_identities(ids)?,
            None => PeerRegistry::default(),
        };
        let identity = match file.identity {
            Some(id) => id,
            None => registry
                .identity_of(self_slot)
                .with_context(|| format!("No identity registered for slot {}", self_slot))?
                .to_string(),
        };

        let mut timing = Timing::default();
        if let Some(ms) = file.heartbeat_interval_ms {
            timing.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.liveness_timeout_ms {
            timing.liveness_timeout = Duration::from_millis(ms);
        }

        let scan_start = file.scan_port_start.unwrap_or(SCAN_PORT_START);
        let scan_end = file.scan_port_end.unwrap_or(SCAN_PORT_END);
        let announce_port = match file.announce_port {
            Some(port) => port,
            None => scan_start
                .checked_add(u16::try_from(self_slot).context("Slot does not fit in a port offset")?)
                .context("Announce port overflows u16")?,
        };

        let config = Self {
            self_slot,
            identity,
            announce_port,
            scan_ports: scan_start..scan_end,
            broadcast_addr: file.broadcast_addr.unwrap_or(BC_ADDR),
            timing,
            num_elevators: file.num_elevators.unwrap_or(registry.len()),
            registry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the peer protocol relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.timing.liveness_timeout > self.timing.heartbeat_interval,
            "Liveness timeout ({:?}) must be larger than the heartbeat interval ({:?})",
            self.timing.liveness_timeout,
            self.timing.heartbeat_interval
        );
        ensure!(!self.timing.heartbeat_interval.is_zero(), "Heartbeat interval can not be zero");
        ensure!(self.num_elevators > 0, "The installation needs at least one elevator");
        ensure!(
            self.self_slot < self.num_elevators,
            "Self slot {} is outside the elevator map (len {})",
            self.self_slot,
            self.num_elevators
        );
        ensure!(!self.identity.is_empty(), "Identity can not be empty");
        ensure!(
            self.registry.slot_of(&self.identity) == Some(self.self_slot),
            "Identity {:?} is not registered to slot {} (registry has it at {:?})",
            self.identity,
            self.self_slot,
            self.registry.slot_of(&self.identity)
        );
        ensure!(self.scan_ports.start < self.scan_ports.end, "Scan port range {:?} is empty", self.scan_ports);
        ensure!(
            self.scan_ports.contains(&self.announce_port),
            "Announce port {} is outside the scan range {:?}, no peer would hear it",
            self.announce_port,
            self.scan_ports
        );
        Ok(())
    }

    /// Ports a receiver should be started on: the scan range without the announce port.
    pub fn listen_ports(&self) -> Vec<u16> {
        self.scan_ports
            .clone()
            .filter(|port| *port != self.announce_port)
            .collect()
    }
}

/// Shape of the optional JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    identity: Option<String>,
    identities: Option<Vec<String>>,
    announce_port: Option<u16>,
    scan_port_start: Option<u16>,
    scan_port_end: Option<u16>,
    broadcast_addr: Option<Ipv4Addr>,
    heartbeat_interval_ms: Option<u64>,
    liveness_timeout_ms: Option<u64>,
    num_elevators: Option<usize>,
}

fn default_announce_port(self_slot: usize) -> anyhow::Result<u16> {
    u16::try_from(self_slot)
        .ok()
        .and_then(|offset| SCAN_PORT_START.checked_add(offset))
        .context("Announce port overflows u16")
}
