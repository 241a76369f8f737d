//! The receiver's out-of-order reassembly buffer.
//!
//! Same slot structure as the sender's window store, but simpler: each
//! slot just holds a frame's `seq` and encoded bytes until it becomes
//! deliverable.

/// Receiver-side slot array holding out-of-order frames pending in-order
/// delivery.
#[derive(Debug)]
pub struct ReorderBuffer {
    slots: Vec<Option<(u32, Vec<u8>)>>,
    window_size: u32,
}

impl ReorderBuffer {
    pub fn new(window_size: u32) -> Self {
        Self {
            slots: (0..window_size).map(|_| None).collect(),
            window_size,
        }
    }

    fn slot(&self, seq: u32) -> usize {
        (seq % self.window_size) as usize
    }

    /// Stores `bytes` for `seq`, overwriting any prior occupant with a
    /// smaller seq (an older frame that's no longer useful once a newer
    /// one for the same slot has arrived).
    pub fn insert(&mut self, seq: u32, bytes: Vec<u8>) {
        let idx = self.slot(seq);
        let should_overwrite = match &self.slots[idx] {
            Some((existing_seq, _)) => seq > *existing_seq,
            None => true,
        };
        if should_overwrite {
            self.slots[idx] = Some((seq, bytes));
        }
    }

    /// Removes and returns the frame for `seq` if present.
    pub fn take(&mut self, seq: u32) -> Option<Vec<u8>> {
        let idx = self.slot(seq);
        match &self.slots[idx] {
            Some((existing_seq, _)) if *existing_seq == seq => {
                self.slots[idx].take().map(|(_, bytes)| bytes)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_take() {
        let mut r = ReorderBuffer::new(4);
        r.insert(5, vec![9, 9]);
        assert_eq!(r.take(5), Some(vec![9, 9]));
        assert_eq!(r.take(5), None);
    }

    #[test]
    fn newer_seq_overwrites_older_in_same_slot() {
        let mut r = ReorderBuffer::new(2);
        r.insert(0, vec![1]); // slot 0
        r.insert(2, vec![2]); // also slot 0, newer seq
        assert_eq!(r.take(0), None);
        assert_eq!(r.take(2), Some(vec![2]));
    }

    #[test]
    fn older_seq_does_not_overwrite_newer() {
        let mut r = ReorderBuffer::new(2);
        r.insert(2, vec![2]);
        r.insert(0, vec![1]);
        assert_eq!(r.take(2), Some(vec![2]));
    }
}
