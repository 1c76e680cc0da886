//! Sequence-space arithmetic and the fixed-capacity slot ring shared by both
//! endpoints.
//!
//! Sequence numbers live in `[0, seq_space)` and wrap.  A window is the
//! cyclic range `[base, base + size)`; membership is decided by the forward
//! distance from `base`, which is what makes `10, 11, 12, 0, 1, 2` a single
//! contiguous window when `seq_space = 13`.

use crate::packet::SeqNum;

/// Forward distance from `base` to `seq`, modulo `seq_space`.
#[inline]
pub fn offset(seq: SeqNum, base: SeqNum, seq_space: SeqNum) -> usize {
    let space = u64::from(seq_space);
    ((u64::from(seq) + space - u64::from(base)) % space) as usize
}

/// `true` when `seq` lies in the cyclic range `[base, base + size)`.
#[inline]
pub fn in_window(seq: SeqNum, base: SeqNum, size: usize, seq_space: SeqNum) -> bool {
    offset(seq, base, seq_space) < size
}

/// `seq + 1` in wrap-around space.
#[inline]
pub fn next_seq(seq: SeqNum, seq_space: SeqNum) -> SeqNum {
    ((u64::from(seq) + 1) % u64::from(seq_space)) as SeqNum
}

/// The base of the window immediately preceding the one starting at `base`.
#[inline]
pub fn previous_base(base: SeqNum, size: usize, seq_space: SeqNum) -> SeqNum {
    let space = u64::from(seq_space);
    let size = size as u64 % space;
    ((u64::from(base) + space - size) % space) as SeqNum
}

// ---------------------------------------------------------------------------
// SlotRing
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of optional slots addressed by offset from the
/// window base.
///
/// Offset 0 is always the window base.  [`SlotRing::advance`] frees the base
/// slot and makes offset 1 the new base, so sliding a window never moves
/// stored values.  Capacity is fixed at construction.
#[derive(Debug)]
pub struct SlotRing<T> {
    slots: Vec<Option<T>>,
    head: usize,
}

impl<T> SlotRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "slot ring capacity must be at least 1");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, offset: usize) -> usize {
        debug_assert!(offset < self.capacity());
        (self.head + offset) % self.capacity()
    }

    pub fn get(&self, offset: usize) -> Option<&T> {
        self.slots[self.index(offset)].as_ref()
    }

    pub fn get_mut(&mut self, offset: usize) -> Option<&mut T> {
        let idx = self.index(offset);
        self.slots[idx].as_mut()
    }

    pub fn is_occupied(&self, offset: usize) -> bool {
        self.get(offset).is_some()
    }

    /// Store `value` at `offset`, returning whatever was there.
    pub fn insert(&mut self, offset: usize, value: T) -> Option<T> {
        let idx = self.index(offset);
        self.slots[idx].replace(value)
    }

    /// Free the base slot and slide the ring forward by one.
    pub fn advance(&mut self) -> Option<T> {
        let taken = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        taken
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Empty every slot and reset the base.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_wraps_as_one_range() {
        // seq_space 13, window 6 starting at 10: 10, 11, 12, 0, 1, 2
        for seq in [10, 11, 12, 0, 1, 2] {
            assert!(in_window(seq, 10, 6, 13), "{seq} should be in window");
        }
        for seq in 3..10 {
            assert!(!in_window(seq, 10, 6, 13), "{seq} should be outside");
        }
        assert_eq!(offset(0, 10, 13), 3);
        assert_eq!(offset(2, 10, 13), 5);
    }

    #[test]
    fn previous_window_wraps() {
        assert_eq!(previous_base(2, 6, 13), 9);
        assert_eq!(previous_base(6, 6, 13), 0);
        // previous window of [2, 8) is [9, 2): 9, 10, 11, 12, 0, 1
        for seq in [9, 10, 11, 12, 0, 1] {
            assert!(in_window(seq, previous_base(2, 6, 13), 6, 13));
        }
        assert!(!in_window(2, previous_base(2, 6, 13), 6, 13));
    }

    #[test]
    fn next_seq_wraps() {
        assert_eq!(next_seq(11, 13), 12);
        assert_eq!(next_seq(12, 13), 0);
    }

    #[test]
    fn arithmetic_holds_at_largest_space() {
        let space = crate::config::MAX_SEQ_SPACE;
        let top = space - 1;
        assert_eq!(offset(1, top, space), 2);
        assert_eq!(offset(top, 1, space), (space - 2) as usize);
        assert!(in_window(2, top, 6, space));
        assert_eq!(next_seq(top, space), 0);
        assert_eq!(previous_base(1, 6, space), space - 5);
    }

    #[test]
    fn ring_offsets_follow_head() {
        let mut ring = SlotRing::new(3);
        ring.insert(0, 'a');
        ring.insert(2, 'c');
        assert_eq!(ring.occupied(), 2);

        assert_eq!(ring.advance(), Some('a'));
        // old offset 2 is now offset 1
        assert_eq!(ring.get(1), Some(&'c'));
        assert!(!ring.is_occupied(0));
        assert!(!ring.is_occupied(2));

        ring.insert(2, 'd');
        assert_eq!(ring.advance(), None);
        assert_eq!(ring.get(0), Some(&'c'));
        assert_eq!(ring.get(1), Some(&'d'));
    }

    #[test]
    fn clear_resets_head() {
        let mut ring = SlotRing::new(2);
        ring.insert(1, 5u8);
        ring.advance();
        ring.clear();
        assert_eq!(ring.occupied(), 0);
        ring.insert(0, 9);
        assert_eq!(ring.get(0), Some(&9));
    }
}
