//! Core wire-level data structures.
//!
//! - `Frame`/`FrameFlag`: the 7-byte-header datagram every exchange uses.
//! - `checksum`: the Internet checksum used to verify frame integrity.
//! - `FilenameInit`: the handshake's filename + negotiated-parameters payload.

mod checksum;
mod frame;
mod init;

pub use checksum::internet_checksum;
pub use frame::{Frame, FrameFlag};
pub use init::FilenameInit;
