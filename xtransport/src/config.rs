//! Protocol-wide constants and negotiated session parameters.

use crate::error::{Error, Result};

/// Size of the frame header in bytes: 4-byte seq + 2-byte checksum + 1-byte flag.
pub const HEADER_SIZE: usize = 7;

/// Maximum payload carried by a single DATA frame.
pub const MAX_DATA_SIZE: usize = 1400;

/// Maximum size of any encoded frame, header included.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_DATA_SIZE;

/// Size of the null-terminated name field in the filename init payload.
pub const NAME_FIELD_SIZE: usize = 101;

/// Total size of the filename init payload: name + window_size + buffer_size.
pub const INIT_PAYLOAD_SIZE: usize = NAME_FIELD_SIZE + 4 + 4;

/// Client retry budget for the initial FILENAME handshake.
pub const INIT_RETRY_LIMIT: u32 = 10;

/// Per-frame retransmit budget before a sender forces forward progress.
pub const MAX_RETRANSMIT: u32 = 10;

/// Client's wait for a FILENAME_RESP before retrying the handshake.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// Child session's wait, per attempt, for the client to acknowledge migration.
pub const CHILD_ACK_WAIT_MS: u64 = 1000;

/// Sender's poll timeout while the window is full.
pub const WINDOW_FULL_POLL_MS: u64 = 1000;

/// Consecutive full-window waits with an unmoved base before the deadlock
/// breaker forces a timeout.
pub const STALL_LIMIT: u32 = 3;

/// Receiver's poll timeout while waiting for the next datagram.
pub const DATA_TIMEOUT_MS: u64 = 10000;

/// Consecutive sender timeouts with no base movement before the base slot
/// is forced to acknowledge regardless of its own retransmit_count.
pub const SENDER_DEADLOCK_TIMEOUTS: u32 = 10;

/// Consecutive receiver timeouts before giving up on the transfer.
pub const RECEIVER_MAX_CONSECUTIVE_TIMEOUTS: u32 = 15;

/// Retries for a "File not found" FILENAME_RESP before the child gives up.
pub const FILE_NOT_FOUND_RETRIES: u32 = 3;

/// Sender attempt number from which any valid terminal RR is accepted.
pub const EOF_ACCEPT_ANY_FROM_ATTEMPT: u32 = 4;

/// Sender attempt number after which the session is closed unilaterally.
pub const EOF_GIVE_UP_AFTER_ATTEMPT: u32 = 6;

/// Negotiated per-session parameters, fixed for the lifetime of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub window_size: u32,
    pub buffer_size: u32,
}

impl SessionParams {
    pub fn new(window_size: u32, buffer_size: u32) -> Self {
        Self {
            window_size,
            buffer_size,
        }
    }

    /// Validates the bounds placed on both fields.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size >= (1 << 30) {
            return Err(Error::InvalidInit);
        }
        if self.buffer_size == 0 || self.buffer_size as usize > MAX_DATA_SIZE {
            return Err(Error::InvalidInit);
        }
        Ok(())
    }

    /// Size of the sender's byte-addressed replay buffer, in packet slots:
    /// `2 * window_size`, each slot holding up to `buffer_size` bytes.
    pub fn replay_capacity_packets(&self) -> usize {
        2 * self.window_size as usize
    }
}
