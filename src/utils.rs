//! Help functions shared by the long-running tasks.

use tokio::sync::watch;

/// Creates the shutdown signal handed to every task.
///
/// Send `true` on the sender to stop the tasks holding a receiver.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown has been requested.
///
/// A dropped sender counts as a shutdown request, so no task outlives its owner.
/// Cancel safe, meant to be used as a branch in `tokio::select!`.
pub async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn resolves_on_signal() {
        let (tx, mut rx) = shutdown_channel();
        assert!(timeout(Duration::from_millis(20), shutdown_requested(&mut rx)).await.is_err());
        tx.send(true).unwrap();
        timeout(Duration::from_secs(1), shutdown_requested(&mut rx)).await.unwrap();
    }

    #[tokio::test]
    async fn resolves_when_sender_dropped() {
        let (tx, mut rx) = shutdown_channel();
        drop(tx);
        timeout(Duration::from_secs(1), shutdown_requested(&mut rx)).await.unwrap();
    }

    #[tokio::test]
    async fn pending_without_signal() {
        let (_tx, mut rx) = shutdown_channel();
        assert!(timeout(Duration::from_millis(50), shutdown_requested(&mut rx)).await.is_err());
    }
}
