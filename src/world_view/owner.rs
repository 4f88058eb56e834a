//! The single task that owns the [ElevatorMap].
//!
//! Proposals arrive as [StateChangeMessage]s on an mpsc channel. Accepted proposals replace
//! the whole map, are published on the map watch, and are forwarded to the layer above
//! (FSM / order management) if a downstream sender was given.

use tokio::sync::{mpsc, watch};

use crate::print;
use crate::utils;
use super::{ElevatorMap, StateChangeMessage};


/// The function that updates the elevator map watch.
///
/// # Note
/// Runs until shutdown is requested or every proposal sender is dropped.
/// Proposals with a different map length than the current one are dropped with a warning,
/// the map length is fixed for the lifetime of the installation.
pub async fn update_map_watch(
    mut proposals_rx: mpsc::Receiver<StateChangeMessage>,
    map_watch_tx: watch::Sender<ElevatorMap>,
    downstream_tx: Option<mpsc::Sender<StateChangeMessage>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            _ = utils::shutdown_requested(&mut shutdown_rx) => break,
            msg = proposals_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let current_len = map_watch_tx.borrow().len();
        if msg.map().len() != current_len {
            print::warn(format!(
                "Dropping proposal '{}': map has {} slots, expected {}",
                msg.reason(),
                msg.map().len(),
                current_len
            ));
            continue;
        }

        map_watch_tx.send_replace(msg.map().clone());
        print::elevator_map(msg.map(), msg.reason().as_str());

        if let Some(tx) = &downstream_tx {
            if tx.send(msg).await.is_err() {
                print::warn("Downstream receiver for state changes is closed".to_string());
            }
        }
    }
    print::info("Elevator map owner stopped".to_string());
}
