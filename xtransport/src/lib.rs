//! Reliable unidirectional file transfer over an unreliable datagram transport.
//!
//! This crate implements the wire protocol: frame encoding, a filename
//! handshake that migrates a session onto a fresh ephemeral endpoint, a
//! sliding-window sender with selective-reject retransmission, and a
//! receiver that reassembles bytes strictly in sequence order. The
//! binaries in `client` and `server` wire this protocol onto real UDP
//! sockets and real files; `xtransport` itself only knows about the
//! `Datagram` and `Source`/`Sink` traits.

pub mod buffer;
pub mod config;
pub mod core;
pub mod error;
pub mod handshake;
pub mod io;
pub mod reliable;
pub mod transport;

pub use config::SessionParams;
pub use core::{Frame, FrameFlag};
pub use error::{Error, Result};
pub use io::{Sink, Source};
pub use reliable::{ReceiverEngine, SenderEngine};
pub use transport::{Datagram, LossyTransport, UdpTransport};
