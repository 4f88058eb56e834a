//! ## UDP broadcast transport
//!
//! Thin wrapper around a tokio [UdpSocket] set up for broadcast send and receive.
//! Socket creation errors are returned to the caller, who decides whether they are fatal.
//! Per-call receive results tell "no data before the deadline" apart from real errors.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config;


/// Outcome of [BroadcastSocket::recv_with_deadline].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A datagram of `len` bytes was written to the buffer
    Datagram {
        /// Number of bytes received
        len: usize,
        /// Sender of the datagram
        from: SocketAddr,
    },
    /// Nothing arrived before the deadline
    Timeout,
}

/// A UDP socket bound on `0.0.0.0:port` with broadcast and address reuse enabled.
#[derive(Debug)]
pub struct BroadcastSocket {
    socket: UdpSocket,
}

impl BroadcastSocket {
    /// Sets up a reusable, non-blocking broadcast socket on `port`.
    ///
    /// Port `0` lets the OS pick a port, which is what a pure transmitter wants.
    ///
    /// # Note
    /// Must be called from inside a tokio runtime.
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket_addr = SocketAddr::V4(SocketAddrV4::new(config::BC_LISTEN_ADDR, port));
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_nonblocking(true)?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&socket_addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self { socket })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sends `payload` as one datagram to `addr:port`.
    pub async fn send_to(&self, payload: &[u8], addr: Ipv4Addr, port: u16) -> io::Result<usize> {
        let target = SocketAddr::V4(SocketAddrV4::new(addr, port));
        self.socket.send_to(payload, target).await
    }

    /// Waits at most `deadline` for one datagram.
    ///
    /// ## Returns
    /// - `Ok(RecvOutcome::Datagram { .. })` if something arrived
    /// - `Ok(RecvOutcome::Timeout)` if nothing arrived in time
    /// - `Err(e)` on a socket error
    pub async fn recv_with_deadline(&self, buf: &mut [u8], deadline: Duration) -> io::Result<RecvOutcome> {
        match timeout(deadline, self.socket.recv_from(buf)).await {
            Ok(Ok((len, from))) => Ok(RecvOutcome::Datagram { len, from }),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(RecvOutcome::Timeout),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_datagram_is_received() {
        let rx = BroadcastSocket::bind(0).unwrap();
        let port = rx.local_addr().unwrap().port();
        let tx = BroadcastSocket::bind(0).unwrap();

        tx.send_to(b"sendIDiszero", Ipv4Addr::LOCALHOST, port).await.unwrap();

        let mut buf = [0u8; config::HEARTBEAT_BUFFER];
        match rx.recv_with_deadline(&mut buf, Duration::from_secs(1)).await.unwrap() {
            RecvOutcome::Datagram { len, .. } => assert_eq!(&buf[..len], b"sendIDiszero"),
            RecvOutcome::Timeout => panic!("expected a datagram"),
        }
    }

    #[tokio::test]
    async fn silence_is_a_timeout_not_an_error() {
        let rx = BroadcastSocket::bind(0).unwrap();
        let mut buf = [0u8; 16];
        let outcome = rx.recv_with_deadline(&mut buf, Duration::from_millis(20)).await.unwrap();
        assert_eq!(outcome, RecvOutcome::Timeout);
    }

}
