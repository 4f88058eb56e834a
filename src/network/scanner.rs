//! ## Port scanner / fan-in
//!
//! Runs one heartbeat receiver per port and merges their output into one channel.
//! Every receiver holds a clone of the same sender, so deltas come out in arrival order
//! with no extra buffering or reordering. There is no ordering guarantee between ports.

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{self, Timing};
use crate::print;
use crate::utils;
use super::peers::{start_peer_receiver, PeerDelta};


/// A set of running heartbeat receivers.
///
/// Dropping the scanner without calling [PortScanner::stop] also stops the receivers,
/// since their shutdown sender goes away, but nothing waits for them.
#[derive(Debug)]
pub struct PortScanner {
    handles: Vec<(u16, JoinHandle<std::io::Result<()>>)>,
    shutdown_tx: watch::Sender<bool>,
}

impl PortScanner {
    /// Starts a receiver on every port in `ports` except `exclude`.
    ///
    /// ## Returns
    /// The scanner, and the merged stream of [PeerDelta]s from all receivers.
    ///
    /// ## Note
    /// Must be called from inside a tokio runtime.
    pub fn start<I>(ports: I, exclude: Option<u16>, timing: Timing) -> (Self, mpsc::Receiver<PeerDelta>)
    where
        I: IntoIterator<Item = u16>,
    {
        let (peer_update_tx, peer_update_rx) = mpsc::channel::<PeerDelta>(config::CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = utils::shutdown_channel();

        let handles = ports
            .into_iter()
            .filter(|port| Some(*port) != exclude)
            .map(|port| {
                let tx = peer_update_tx.clone();
                let shutdown_rx = shutdown_rx.clone();
                let handle = tokio::spawn(async move {
                    let result = start_peer_receiver(port, timing, tx, shutdown_rx).await;
                    if let Err(e) = &result {
                        print::err(format!("Could not listen for heartbeats on port {}: {}", port, e));
                    }
                    result
                });
                (port, handle)
            })
            .collect();

        (Self { handles, shutdown_tx }, peer_update_rx)
    }

    /// Ports with a receiver started on them.
    pub fn ports(&self) -> Vec<u16> {
        self.handles.iter().map(|(port, _)| *port).collect()
    }

    /// Signals every receiver to stop and waits for all of them.
    ///
    /// ## Returns
    /// The ports whose receiver ended with an error or panicked.
    pub async fn stop(self) -> Vec<u16> {
        let _ = self.shutdown_tx.send(true);

        let (ports, handles): (Vec<u16>, Vec<_>) = self.handles.into_iter().unzip();
        join_all(handles)
            .await
            .into_iter()
            .zip(ports)
            .filter(|(result, _)| !matches!(result, Ok(Ok(()))))
            .map(|(_, port)| port)
            .collect()
    }
}
