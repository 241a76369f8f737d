//! Sender and receiver packet stores.
//!
//! - `SendWindow`: the sender's in-window record, keyed by `seq mod window_size`.
//! - `ReplayBuffer`: the sender's byte-addressed history, twice the window wide.
//! - `ReorderBuffer`: the receiver's out-of-order slot array.

mod reorder;
mod replay;
mod window;

pub use reorder::ReorderBuffer;
pub use replay::ReplayBuffer;
pub use window::{SendWindow, WindowEntry};
