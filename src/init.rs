//! Startup helpers: command line arguments, configuration and the initial elevator map.

use std::env;
use std::path::PathBuf;

use anyhow::Context;

use crate::config::PeerConfig;
use crate::print;
use crate::world_view::{ElevatorBehaviour, ElevatorMap};


/// Parsed command line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Slot of this node in the elevator map
    pub self_slot: usize,
    /// Optional JSON config file
    pub config_path: Option<PathBuf>,
}

/// Reads `<self_slot> [config.json]` from the process arguments.
///
/// Start a node with `cargo r -- 1` or `cargo r -- 1 peers.json`.
pub fn parse_args() -> anyhow::Result<Args> {
    parse_args_from(env::args().skip(1))
}

/// Same as [parse_args], from any argument list (without the program name).
pub fn parse_args_from<I, S>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    let slot_arg = args
        .next()
        .context("Missing argument: usage <self_slot> [config.json]")?;
    let self_slot = slot_arg
        .as_ref()
        .parse::<usize>()
        .with_context(|| format!("Self slot must be a non-negative integer, got {:?}", slot_arg.as_ref()))?;
    let config_path = args.next().map(|p| PathBuf::from(p.as_ref()));

    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected argument {:?}", extra.as_ref());
    }
    Ok(Args { self_slot, config_path })
}

/// Builds and validates the node configuration from the arguments.
pub fn build_config(args: &Args) -> anyhow::Result<PeerConfig> {
    let config = match &args.config_path {
        Some(path) => PeerConfig::from_json_file(path, args.self_slot)?,
        None => PeerConfig::new(args.self_slot)?,
    };
    print::info(format!(
        "Node {} as {:?}: announce port {}, scanning {:?}, heartbeat {:?}, timeout {:?}",
        config.self_slot,
        config.identity,
        config.announce_port,
        config.scan_ports,
        config.timing.heartbeat_interval,
        config.timing.liveness_timeout
    ));
    Ok(config)
}

/// The elevator map at startup.
///
/// This node is alive by definition and starts [ElevatorBehaviour::Idle].
/// Everybody else is [ElevatorBehaviour::Dead] until their heartbeat is heard.
pub fn initialize_map(config: &PeerConfig) -> anyhow::Result<ElevatorMap> {
    let mut map = ElevatorMap::new(config.num_elevators);
    map.set_behaviour(config.self_slot, ElevatorBehaviour::Idle)
        .context("Self slot does not fit in the elevator map")?;
    Ok(map)
}
