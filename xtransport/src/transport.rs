//! Datagram transport abstraction.
//!
//! `Datagram` is the external collaborator the sender/receiver engines and
//! the handshake are generic over: send-to/recv-with-timeout, nothing
//! else. `UdpTransport` wraps a real `tokio::net::UdpSocket`;
//! `LossyTransport` wraps any `Datagram` to simulate the network
//! impairment requested via the CLI's `error_rate`; `LoopbackTransport`
//! is an in-memory pair for tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::error::Result;

/// A datagram transport: unordered, unreliable, timeout-aware.
pub trait Datagram {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()>;

    /// Waits up to `timeout` for a datagram. `Duration::ZERO` polls once
    /// without blocking. Returns `Ok(None)` on timeout.
    async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> Result<SocketAddr>;
}

/// A real UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }
}

impl Datagram for UdpTransport {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
        self.socket.send_to(buf, target).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, SocketAddr)>> {
        if timeout.is_zero() {
            return match self.socket.try_recv_from(buf) {
                Ok((n, from)) => Ok(Some((n, from))),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(e.into()),
            };
        }
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, from))) => Ok(Some((n, from))),
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => Ok(None),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Wraps a `Datagram` and simulates packet loss and corruption on
/// outbound sends, split evenly between the two failure modes.
pub struct LossyTransport<T> {
    inner: T,
    drop_rate: f64,
    corrupt_rate: f64,
}

impl<T: Datagram> LossyTransport<T> {
    pub fn new(inner: T, error_rate: f64) -> Self {
        let error_rate = error_rate.clamp(0.0, 1.0);
        Self {
            inner,
            drop_rate: error_rate / 2.0,
            corrupt_rate: error_rate / 2.0,
        }
    }
}

impl<T: Datagram> Datagram for LossyTransport<T> {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
        if self.drop_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.drop_rate {
            log::debug!("simulated drop of {} bytes to {}", buf.len(), target);
            return Ok(());
        }
        if self.corrupt_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.corrupt_rate {
            let mut corrupted = buf.to_vec();
            let idx = rand::thread_rng().gen_range(0..corrupted.len().max(1));
            if idx < corrupted.len() {
                corrupted[idx] ^= 0xff;
            }
            log::debug!("simulated corruption of {} bytes to {}", buf.len(), target);
            return self.inner.send_to(&corrupted, target).await;
        }
        self.inner.send_to(buf, target).await
    }

    async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, SocketAddr)>> {
        self.inner.recv(buf, timeout).await
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// In-memory datagram transport for tests. Each endpoint is a named
/// channel; `send_to` looks up the target's inbox by address.
pub struct LoopbackTransport {
    addr: SocketAddr,
    inbox: Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    peers: Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>>>,
}

impl LoopbackTransport {
    /// Creates a connected pair of loopback endpoints at the given
    /// synthetic addresses.
    pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let mut peers_a = HashMap::new();
        peers_a.insert(addr_b, tx_b);
        let mut peers_b = HashMap::new();
        peers_b.insert(addr_a, tx_a);

        (
            Self {
                addr: addr_a,
                inbox: Mutex::new(rx_a),
                peers: Mutex::new(peers_a),
            },
            Self {
                addr: addr_b,
                inbox: Mutex::new(rx_b),
                peers: Mutex::new(peers_b),
            },
        )
    }
}

impl Datagram for LoopbackTransport {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<()> {
        let peers = self.peers.lock().unwrap();
        if let Some(tx) = peers.get(&target) {
            let _ = tx.send((buf.to_vec(), self.addr));
        }
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, SocketAddr)>> {
        let recv_fut = async {
            let mut inbox = self.inbox.lock().unwrap();
            inbox.recv().await
        };
        let result = if timeout.is_zero() {
            recv_fut.await
        } else {
            match tokio::time::timeout(timeout, recv_fut).await {
                Ok(r) => r,
                Err(_elapsed) => return Ok(None),
            }
        };
        match result {
            Some((data, from)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(Some((n, from)))
            }
            None => Ok(None),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }
}
