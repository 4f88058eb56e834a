//! ## Peer watch
//!
//! The failure detector's decision point. Consumes the merged [PeerDelta] stream from the
//! [PortScanner], looks identities up in the [PeerRegistry], and proposes updated
//! [ElevatorMap]s to the map owner as [StateChangeMessage]s.
//!
//! - A registered peer that shows up is marked [ElevatorBehaviour::Idle] ("New elevator")
//! - Every registered peer in the lost set is marked [ElevatorBehaviour::Dead] ("Dead elevator")
//! - Identities not in the registry are ignored, membership is closed
//!
//! [start] wires a heartbeat transmitter, the scanner and the reconciler together and
//! hands back a [PeerWatchHandle] to control and stop them.

pub mod registry;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::PeerConfig;
use crate::network::peers::{start_peer_transmitter, PeerDelta};
use crate::network::scanner::PortScanner;
use crate::print;
use crate::utils;
use crate::world_view::{self, ChangeReason, ElevatorBehaviour, ElevatorMap, StateChangeMessage, WorldViewError};
use registry::PeerRegistry;


/// Turns peer deltas into proposed elevator maps.
#[derive(Debug, Clone)]
pub struct PeerWatch {
    registry: PeerRegistry,
}

impl PeerWatch {
    /// Creates a reconciler for the members in `registry`.
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }

    /// Folds one delta into `snapshot`.
    ///
    /// ## Returns
    /// One message per slot that changed, arrival first, then every loss in the order
    /// reported. Each message carries the snapshot with all transitions so far, so the
    /// last one holds the full result.
    pub fn reconcile(&self, delta: &PeerDelta, mut snapshot: ElevatorMap) -> Vec<StateChangeMessage> {
        let mut messages = Vec::new();

        if let Some(id) = &delta.new {
            self.transition(id, ElevatorBehaviour::Idle, ChangeReason::NewElevator, &mut snapshot, &mut messages);
        }
        for id in &delta.lost {
            self.transition(id, ElevatorBehaviour::Dead, ChangeReason::DeadElevator, &mut snapshot, &mut messages);
        }
        messages
    }

    fn transition(
        &self,
        id: &str,
        behaviour: ElevatorBehaviour,
        reason: ChangeReason,
        snapshot: &mut ElevatorMap,
        messages: &mut Vec<StateChangeMessage>,
    ) {
        let Some(slot) = self.registry.slot_of(id) else {
            print::debug(format!("Ignoring unregistered peer {:?} ({})", id, reason));
            return;
        };

        match snapshot.set_behaviour(slot, behaviour) {
            Ok(()) => messages.push(StateChangeMessage::new(snapshot.clone(), reason)),
            Err(WorldViewError::SlotOutOfRange { slot, len }) => {
                print::warn(format!(
                    "Config: peer {:?} is registered to slot {}, but the elevator map only has {} slots. Skipping '{}'",
                    id, slot, len, reason
                ));
            }
        }
    }
}


/// Runs the reconciler loop
///
/// ## Parameters
/// `peer_watch`: The reconciler
/// `peer_update_rx`: Merged deltas from the scanner
/// `map_watch_rx`: Snapshot source, owned by the map owner
/// `state_tx`: Where [StateChangeMessage]s are proposed
/// `apply_timeout`: How long to wait for the map owner to publish a proposal
/// `shutdown_rx`: Stops the loop
///
/// ## Behaviour
/// After proposing, the loop waits until the map watch shows the changed slots before
/// reading the next snapshot. Otherwise two deltas in quick succession would both start
/// from the same old map, and the second proposal would undo the first.
/// If the owner does not publish within `apply_timeout`, a warning is printed and the loop
/// carries on with whatever the watch holds.
///
/// ## Note
/// Ends on shutdown, when the delta stream closes, or when nobody listens on `state_tx`.
pub async fn run_peer_watch(
    peer_watch: PeerWatch,
    mut peer_update_rx: mpsc::Receiver<PeerDelta>,
    mut map_watch_rx: watch::Receiver<ElevatorMap>,
    state_tx: mpsc::Sender<StateChangeMessage>,
    apply_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let delta = tokio::select! {
            _ = utils::shutdown_requested(&mut shutdown_rx) => break,
            delta = peer_update_rx.recv() => match delta {
                Some(delta) => delta,
                None => break,
            },
        };

        let snapshot = world_view::get_map(&map_watch_rx);
        let msgs = peer_watch.reconcile(&delta, snapshot.clone());
        let expected = match msgs.last() {
            Some(last) => changed_slots(&snapshot, last.map()),
            None => continue,
        };

        for msg in msgs {
            if state_tx.send(msg).await.is_err() {
                print::err("State change receiver is closed, stopping peer watch".to_string());
                return;
            }
        }

        let applied = timeout(
            apply_timeout,
            map_watch_rx.wait_for(|map| {
                expected
                    .iter()
                    .all(|(slot, behaviour)| map.get(*slot).map(|s| s.behaviour) == Some(*behaviour))
            }),
        )
        .await
        .map(|seen| seen.map(|_| ()));
        match applied {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => {
                print::err("Elevator map owner is gone, stopping peer watch".to_string());
                return;
            }
            Err(_) => print::warn(format!(
                "Elevator map owner did not publish {:?} within {:?}",
                expected, apply_timeout
            )),
        }
    }
}

/// Slots whose behaviour differs between `before` and `after`.
fn changed_slots(before: &ElevatorMap, after: &ElevatorMap) -> Vec<(usize, ElevatorBehaviour)> {
    after
        .iter()
        .enumerate()
        .filter(|(i, slot)| before.get(*i).map(|s| s.behaviour) != Some(slot.behaviour))
        .map(|(i, slot)| (i, slot.behaviour))
        .collect()
}


/// Controls a running peer watch. See [start].
#[derive(Debug)]
pub struct PeerWatchHandle {
    enable_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    scanner: PortScanner,
    transmitter: JoinHandle<std::io::Result<()>>,
    reconciler: JoinHandle<()>,
}

impl PeerWatchHandle {
    /// Turns this node's heartbeat on or off. Takes effect on the next tick.
    pub fn set_transmit_enabled(&self, enabled: bool) {
        let _ = self.enable_tx.send(enabled);
    }

    /// Ports with a heartbeat receiver.
    pub fn listen_ports(&self) -> Vec<u16> {
        self.scanner.ports()
    }

    /// Stops the transmitter, every receiver and the reconciler, and waits for all of them.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.reconciler.await {
            print::err(format!("Peer watch reconciler ended abnormally: {}", e));
        }
        let failed = self.scanner.stop().await;
        if !failed.is_empty() {
            print::warn(format!("Heartbeat receivers on ports {:?} did not stop cleanly", failed));
        }
        match self.transmitter.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => print::err(format!("Heartbeat transmitter failed: {}", e)),
            Err(e) => print::err(format!("Heartbeat transmitter ended abnormally: {}", e)),
        }
        print::info("Peer watch stopped".to_string());
    }
}

/// Starts peer discovery for this node.
///
/// Spawns the heartbeat transmitter on `config.announce_port`, one receiver per port in
/// [PeerConfig::listen_ports], and the reconciler feeding `state_tx`.
///
/// ## Note
/// Must be called from inside a tokio runtime.
pub fn start(
    config: &PeerConfig,
    map_watch_rx: watch::Receiver<ElevatorMap>,
    state_tx: mpsc::Sender<StateChangeMessage>,
) -> PeerWatchHandle {
    let (enable_tx, enable_rx) = watch::channel(true);
    let (shutdown_tx, shutdown_rx) = utils::shutdown_channel();

    let transmitter = {
        let shutdown_rx = shutdown_rx.clone();
        let (port, addr, id, period) = (
            config.announce_port,
            config.broadcast_addr,
            config.identity.clone(),
            config.timing.heartbeat_interval,
        );
        tokio::spawn(async move {
            print::info(format!("Broadcasting heartbeat {:?} on port {}", id, port));
            start_peer_transmitter(port, addr, id, period, enable_rx, shutdown_rx).await
        })
    };

    let (scanner, peer_update_rx) = PortScanner::start(config.listen_ports(), Some(config.announce_port), config.timing);

    let reconciler = {
        let peer_watch = PeerWatch::new(config.registry.clone());
        let apply_timeout = config.timing.liveness_timeout;
        tokio::spawn(run_peer_watch(peer_watch, peer_update_rx, map_watch_rx, state_tx, apply_timeout, shutdown_rx))
    };

    PeerWatchHandle {
        enable_tx,
        shutdown_tx,
        scanner,
        transmitter,
        reconciler,
    }
}
