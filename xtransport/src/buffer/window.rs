//! The sender's in-window packet store.
//!
//! Indexed primarily by `seq mod window_size`, with a linear fallback on
//! both insertion and lookup so that a slot collision between an
//! unacknowledged occupant and a newly-filled seq doesn't silently drop
//! either record.

use crate::core::FrameFlag;

/// A single live frame held in the sliding window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    pub seq: u32,
    pub frame: Vec<u8>,
    pub flag: FrameFlag,
    pub acknowledged: bool,
    pub retransmit_count: u32,
}

/// Sliding-window store of outstanding sender frames.
#[derive(Debug)]
pub struct SendWindow {
    slots: Vec<Option<WindowEntry>>,
    window_size: u32,
}

impl SendWindow {
    pub fn new(window_size: u32) -> Self {
        Self {
            slots: (0..window_size).map(|_| None).collect(),
            window_size,
        }
    }

    fn primary_slot(&self, seq: u32) -> usize {
        (seq % self.window_size) as usize
    }

    /// Inserts a new frame. Prefers the primary `seq mod window_size`
    /// slot; if occupied by a different, still-unacknowledged seq, scans
    /// for an empty or acknowledged slot before falling back to
    /// overwriting the primary slot's occupant.
    pub fn insert(&mut self, seq: u32, frame: Vec<u8>, flag: FrameFlag) {
        let primary = self.primary_slot(seq);
        let primary_blocked =
            matches!(&self.slots[primary], Some(e) if e.seq != seq && !e.acknowledged);

        let target = if primary_blocked {
            self.slots
                .iter()
                .position(|s| matches!(s, None) || matches!(s, Some(e) if e.acknowledged))
                .unwrap_or(primary)
        } else {
            primary
        };

        self.slots[target] = Some(WindowEntry {
            seq,
            frame,
            flag,
            acknowledged: false,
            retransmit_count: 0,
        });
    }

    fn find_slot(&self, seq: u32) -> Option<usize> {
        let primary = self.primary_slot(seq);
        if matches!(&self.slots[primary], Some(e) if e.seq == seq) {
            return Some(primary);
        }
        self.slots
            .iter()
            .position(|s| matches!(s, Some(e) if e.seq == seq))
    }

    pub fn get(&self, seq: u32) -> Option<&WindowEntry> {
        self.find_slot(seq).and_then(|i| self.slots[i].as_ref())
    }

    pub fn get_mut(&mut self, seq: u32) -> Option<&mut WindowEntry> {
        let idx = self.find_slot(seq)?;
        self.slots[idx].as_mut()
    }

    /// Marks `seq` acknowledged if it has a live record. Returns whether a
    /// record existed (used to keep RR processing idempotent).
    pub fn acknowledge(&mut self, seq: u32) -> bool {
        match self.get_mut(seq) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn is_acknowledged(&self, seq: u32) -> bool {
        self.get(seq).map(|e| e.acknowledged).unwrap_or(false)
    }

    /// Releases the slot holding `seq`, if any.
    pub fn clear(&mut self, seq: u32) {
        if let Some(idx) = self.find_slot(seq) {
            self.slots[idx] = None;
        }
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut w = SendWindow::new(4);
        w.insert(0, vec![1, 2, 3], FrameFlag::Data);
        assert_eq!(w.get(0).unwrap().frame, vec![1, 2, 3]);
        assert!(w.get(1).is_none());
    }

    #[test]
    fn acknowledge_then_reinsert_same_slot() {
        let mut w = SendWindow::new(4);
        w.insert(0, vec![1], FrameFlag::Data);
        w.acknowledge(0);
        w.clear(0);
        w.insert(4, vec![2], FrameFlag::Data);
        assert_eq!(w.get(4).unwrap().frame, vec![2]);
    }

    #[test]
    fn collision_with_unacknowledged_occupant_finds_alternate_slot() {
        let mut w = SendWindow::new(2);
        w.insert(0, vec![1], FrameFlag::Data); // slot 0
        w.insert(1, vec![2], FrameFlag::Data); // slot 1
        // seq 2 would also map to slot 0, which still holds unacknowledged seq 0.
        w.insert(2, vec![3], FrameFlag::Data);
        assert_eq!(w.get(0).unwrap().frame, vec![1]);
        assert_eq!(w.get(2).unwrap().frame, vec![3]);
    }

    #[test]
    fn idempotent_acknowledge() {
        let mut w = SendWindow::new(4);
        w.insert(0, vec![1], FrameFlag::Data);
        w.acknowledge(0);
        w.acknowledge(0);
        assert!(w.is_acknowledged(0));
    }
}
