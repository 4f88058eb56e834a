//! Periodic heartbeat broadcaster.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::network::bcast::BroadcastSocket;
use crate::print;
use crate::utils;


/// Starts and runs the heartbeat transmitter
///
/// ## Parameters
/// `port`: Port the heartbeat is sent to
/// `addr`: Address the heartbeat is sent to, normally [crate::config::BC_ADDR]
/// `id`: Identity broadcast on every tick
/// `period`: Time between heartbeats
/// `enable_rx`: Latest value decides whether the next tick sends. `true` until told otherwise
/// `shutdown_rx`: Stops the transmitter
///
/// ## Behavior
/// - Sets up a reusable broadcast socket on an OS-assigned port
/// - Sends `id` once per `period` while enabled. Fire and forget, no retries
/// - Send errors are printed and the loop carries on
///
/// ## Note
/// This function blocks until shutdown, and should be called asynchronously.
/// Failing to create the socket is returned as an error, there is no meaningful fallback.
pub async fn start_peer_transmitter(
    port: u16,
    addr: Ipv4Addr,
    id: String,
    period: Duration,
    mut enable_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let socket = BroadcastSocket::bind(0)?;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut enabled = *enable_rx.borrow_and_update();
    let mut enable_open = true;

    loop {
        tokio::select! {
            _ = utils::shutdown_requested(&mut shutdown_rx) => break,
            changed = enable_rx.changed(), if enable_open => {
                match changed {
                    Ok(()) => enabled = *enable_rx.borrow_and_update(),
                    // Nobody can change it any more, keep the last value
                    Err(_) => enable_open = false,
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if enabled {
            if let Err(e) = socket.send_to(id.as_bytes(), addr, port).await {
                print::err(format!("Heartbeat to {}:{} failed: {}", addr, port, e));
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::network::bcast::RecvOutcome;
    use tokio::time::timeout;

    async fn recv_one(socket: &BroadcastSocket, wait: Duration) -> Option<String> {
        let mut buf = [0u8; config::HEARTBEAT_BUFFER];
        match socket.recv_with_deadline(&mut buf, wait).await.unwrap() {
            RecvOutcome::Datagram { len, .. } => Some(String::from_utf8_lossy(&buf[..len]).into_owned()),
            RecvOutcome::Timeout => None,
        }
    }

    #[tokio::test]
    async fn sends_identity_while_enabled() {
        let listener = BroadcastSocket::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let (enable_tx, enable_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = utils::shutdown_channel();

        let task = tokio::spawn(start_peer_transmitter(
            port,
            Ipv4Addr::LOCALHOST,
            "sendIDiszero".to_string(),
            Duration::from_millis(10),
            enable_rx,
            shutdown_rx,
        ));

        assert_eq!(recv_one(&listener, Duration::from_secs(1)).await.as_deref(), Some("sendIDiszero"));
        assert_eq!(recv_one(&listener, Duration::from_secs(1)).await.as_deref(), Some("sendIDiszero"));

        enable_tx.send(false).unwrap();
        // Let in-flight heartbeats drain
        tokio::time::sleep(Duration::from_millis(50)).await;
        while recv_one(&listener, Duration::from_millis(5)).await.is_some() {}
        assert_eq!(recv_one(&listener, Duration::from_millis(100)).await, None);

        enable_tx.send(true).unwrap();
        assert_eq!(recv_one(&listener, Duration::from_secs(1)).await.as_deref(), Some("sendIDiszero"));

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn dropped_enable_sender_keeps_last_value() {
        let listener = BroadcastSocket::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let (enable_tx, enable_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = utils::shutdown_channel();

        let task = tokio::spawn(start_peer_transmitter(
            port,
            Ipv4Addr::LOCALHOST,
            "sendIDistwo".to_string(),
            Duration::from_millis(10),
            enable_rx,
            shutdown_rx,
        ));
        drop(enable_tx);

        assert_eq!(recv_one(&listener, Duration::from_secs(1)).await.as_deref(), Some("sendIDistwo"));

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
    }
}
