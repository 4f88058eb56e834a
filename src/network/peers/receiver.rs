//! Heartbeat listener for one port.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::config::{self, Timing};
use crate::network::bcast::{BroadcastSocket, RecvOutcome};
use crate::print;
use crate::utils;
use super::liveness::LivenessTable;
use super::PeerDelta;


/// Starts and runs a heartbeat receiver on `port`
///
/// ## Parameters
/// `port`: Port to listen on
/// `timing`: Heartbeat interval (receive deadline) and liveness timeout
/// `peer_update_tx`: Sink for [PeerDelta]s
/// `shutdown_rx`: Stops the receiver
///
/// ## Behaviour
/// - Waits at most one heartbeat interval for a datagram each cycle
/// - Payloads that are empty or not UTF-8 are ignored
/// - Every cycle, heard or not, peers older than the liveness timeout are dropped
/// - Sends a [PeerDelta] only when a peer arrived or was lost
///
/// ## Note
/// Returns an error only if the socket can not be created. Receive errors are printed and
/// the receiver keeps going. Returns `Ok(())` on shutdown or when `peer_update_tx` is closed.
pub async fn start_peer_receiver(
    port: u16,
    timing: Timing,
    peer_update_tx: mpsc::Sender<PeerDelta>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let socket = BroadcastSocket::bind(port)?;
    let mut table = LivenessTable::new(timing.liveness_timeout);
    let mut buf = [0u8; config::HEARTBEAT_BUFFER];

    loop {
        let outcome = tokio::select! {
            _ = utils::shutdown_requested(&mut shutdown_rx) => break,
            outcome = socket.recv_with_deadline(&mut buf, timing.heartbeat_interval) => outcome,
        };

        let heard = match outcome {
            Ok(RecvOutcome::Datagram { len, .. }) => std::str::from_utf8(&buf[..len]).ok(),
            Ok(RecvOutcome::Timeout) => None,
            Err(e) => {
                print::err(format!("Heartbeat receive on port {} failed: {}", port, e));
                // Still age out peers, then back off for one interval
                if let Some(delta) = table.observe(None, Instant::now()) {
                    if !forward(&peer_update_tx, port, delta).await {
                        break;
                    }
                }
                if back_off(timing.heartbeat_interval, &mut shutdown_rx).await {
                    break;
                }
                continue;
            }
        };

        if let Some(delta) = table.observe(heard, Instant::now()) {
            if !forward(&peer_update_tx, port, delta).await {
                break;
            }
        }
    }
    Ok(())
}

/// Sleeps for `period` unless shutdown comes first. Returns true on shutdown.
async fn back_off(period: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = utils::shutdown_requested(shutdown_rx) => true,
        _ = tokio::time::sleep(period) => false,
    }
}

/// Sends `delta` on the sink. Returns false if the sink is closed.
async fn forward(peer_update_tx: &mpsc::Sender<PeerDelta>, port: u16, delta: PeerDelta) -> bool {
    print::peer_delta(port, &delta);
    peer_update_tx.send(delta).await.is_ok()
}
