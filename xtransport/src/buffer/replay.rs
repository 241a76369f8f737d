//! The sender's byte-addressed replay buffer.
//!
//! A ring of `2 * window_size` packet-sized slots that remembers raw file
//! payloads for sequence numbers that may have already been evicted from
//! the in-window store, so a late SREJ can still be satisfied.

/// Byte ring indexed by `(seq - start_seq) * buffer_size`, holding the
/// last `capacity_packets` packets written.
#[derive(Debug)]
pub struct ReplayBuffer {
    buffer: Vec<u8>,
    buffer_size: usize,
    capacity_packets: usize,
    lens: Vec<usize>,
    start_seq: u32,
    end_seq: u32,
}

impl ReplayBuffer {
    pub fn new(capacity_packets: usize, buffer_size: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity_packets * buffer_size],
            buffer_size,
            capacity_packets,
            lens: vec![0; capacity_packets],
            start_seq: 0,
            end_seq: 0,
        }
    }

    fn slot(&self, seq: u32) -> usize {
        (seq as usize) % self.capacity_packets
    }

    /// Appends `data` for `end_seq`, advancing it, and evicting the
    /// oldest packet if the ring is now full.
    pub fn write(&mut self, seq: u32, data: &[u8]) {
        debug_assert_eq!(seq, self.end_seq);
        let idx = self.slot(seq);
        let offset = idx * self.buffer_size;
        self.buffer[offset..offset + data.len()].copy_from_slice(data);
        self.lens[idx] = data.len();
        self.end_seq = self.end_seq.wrapping_add(1);
        if (self.end_seq.wrapping_sub(self.start_seq)) as usize > self.capacity_packets {
            self.start_seq = self.end_seq.wrapping_sub(self.capacity_packets as u32);
        }
    }

    /// Reads the payload stored for `seq`, if it is still within range.
    pub fn read(&self, seq: u32) -> Option<&[u8]> {
        if seq < self.start_seq || seq >= self.end_seq {
            return None;
        }
        let idx = self.slot(seq);
        let offset = idx * self.buffer_size;
        let len = self.lens[idx];
        Some(&self.buffer[offset..offset + len])
    }

    pub fn contains(&self, seq: u32) -> bool {
        seq >= self.start_seq && seq < self.end_seq
    }
}
