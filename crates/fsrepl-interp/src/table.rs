//! Bounded descriptor tables.
//!
//! A table maps small integers to live handles. Slots live in a growable
//! arena and freed indices go into an ordered free list, so allocation always
//! takes the lowest free index. The configured capacity bounds the arena.

use std::collections::BTreeSet;

use fsrepl_types::error::{ReplError, Result, StorageResult};

/// Slot arena of owned handles.
#[derive(Debug)]
pub struct DescriptorTable<H> {
    slots: Vec<Option<H>>,
    /// Vacant indices below `slots.len()`.
    free: BTreeSet<usize>,
    capacity: usize,
}

impl<H> DescriptorTable<H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: BTreeSet::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `handle` in the lowest free slot. When the table is full the
    /// handle is handed back so the caller can close it.
    pub fn insert(&mut self, handle: H) -> std::result::Result<usize, H> {
        if let Some(index) = self.free.pop_first() {
            self.slots[index] = Some(handle);
            return Ok(index);
        }
        if self.slots.len() >= self.capacity {
            return Err(handle);
        }
        self.slots.push(Some(handle));
        Ok(self.slots.len() - 1)
    }

    /// The handle in slot `index`.
    pub fn lookup(&mut self, index: u64) -> Result<&mut H> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
            .ok_or(ReplError::BadDescriptor(index))
    }

    /// Close and drop the handle in slot `index`. The slot is freed only if
    /// `close` succeeds; otherwise the handle stays and the error is returned.
    pub fn release<F>(&mut self, index: u64, close: F) -> Result<()>
    where
        F: FnOnce(&mut H) -> StorageResult<()>,
    {
        close(self.lookup(index)?)?;
        let slot = index as usize;
        self.slots[slot] = None;
        self.free.insert(slot);
        Ok(())
    }

    /// Close every held handle, emptying the table even where `close` fails.
    /// Returns the number of failed closes.
    pub fn drain<F>(&mut self, mut close: F) -> usize
    where
        F: FnMut(&mut H) -> StorageResult<()>,
    {
        let mut failures = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(handle) = slot.as_mut() else {
                continue;
            };
            if let Err(e) = close(handle) {
                log::warn!("close({index}) during teardown failed: {e}");
                failures += 1;
            }
        }
        self.slots.clear();
        self.free.clear();
        failures
    }
}

#[cfg(test)]
mod tests {
    use fsrepl_types::error::Errno;

    use super::*;

    /// A handle that records whether it has been closed.
    #[derive(Debug, PartialEq)]
    struct Fake {
        id: u32,
        closed: bool,
    }

    fn fake(id: u32) -> Fake {
        Fake { id, closed: false }
    }

    fn close_ok(h: &mut Fake) -> StorageResult<()> {
        h.closed = true;
        Ok(())
    }

    #[test]
    fn first_inserts_get_ascending_indices() {
        let mut t = DescriptorTable::new(8);
        for expected in 0..3 {
            assert_eq!(t.insert(fake(expected as u32)).unwrap(), expected);
        }
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn freed_slot_is_reused_first() {
        let mut t = DescriptorTable::new(8);
        for i in 0..3 {
            t.insert(fake(i)).unwrap();
        }
        t.release(1, close_ok).unwrap();
        assert_eq!(t.insert(fake(9)).unwrap(), 1);
        assert_eq!(t.lookup(1).unwrap().id, 9);
    }

    #[test]
    fn lowest_free_slot_wins() {
        let mut t = DescriptorTable::new(8);
        for i in 0..4 {
            t.insert(fake(i)).unwrap();
        }
        t.release(3, close_ok).unwrap();
        t.release(0, close_ok).unwrap();
        t.release(2, close_ok).unwrap();
        assert_eq!(t.insert(fake(10)).unwrap(), 0);
        assert_eq!(t.insert(fake(11)).unwrap(), 2);
        assert_eq!(t.insert(fake(12)).unwrap(), 3);
        assert_eq!(t.insert(fake(13)).unwrap(), 4);
    }

    #[test]
    fn full_table_hands_handle_back() {
        let mut t = DescriptorTable::new(4);
        for i in 0..4 {
            t.insert(fake(i)).unwrap();
        }
        let rejected = t.insert(fake(99)).unwrap_err();
        assert_eq!(rejected.id, 99);
        for i in 0..4u32 {
            assert_eq!(t.lookup(u64::from(i)).unwrap().id, i);
        }
    }

    #[test]
    fn double_release_is_bad_descriptor() {
        let mut t = DescriptorTable::new(4);
        t.insert(fake(0)).unwrap();
        t.release(0, close_ok).unwrap();
        let err = t.release(0, close_ok).unwrap_err();
        assert!(matches!(err, ReplError::BadDescriptor(0)));
    }

    #[test]
    fn out_of_range_lookup() {
        let mut t: DescriptorTable<Fake> = DescriptorTable::new(4);
        assert!(matches!(t.lookup(0), Err(ReplError::BadDescriptor(0))));
        assert!(matches!(t.lookup(u64::MAX), Err(ReplError::BadDescriptor(u64::MAX))));
    }

    #[test]
    fn failed_close_keeps_slot() {
        let mut t = DescriptorTable::new(4);
        t.insert(fake(0)).unwrap();
        let err = t.release(0, |_| Err(Errno::Io)).unwrap_err();
        assert!(matches!(err, ReplError::Storage(Errno::Io)));
        assert_eq!(t.lookup(0).unwrap().id, 0);
        assert_eq!(t.insert(fake(1)).unwrap(), 1);
    }

    #[test]
    fn drain_clears_even_on_failure() {
        let mut t = DescriptorTable::new(4);
        for i in 0..3 {
            t.insert(fake(i)).unwrap();
        }
        let mut seen = Vec::new();
        let failures = t.drain(|h| {
            seen.push(h.id);
            if h.id == 1 { Err(Errno::Io) } else { close_ok(h) }
        });
        assert_eq!(failures, 1);
        assert_eq!(seen, [0, 1, 2]);
        assert!(t.is_empty());
        assert_eq!(t.insert(fake(5)).unwrap(), 0);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Model check against "smallest index not currently in use".
            #[test]
            fn allocation_is_lowest_free(ops in proptest::collection::vec((any::<bool>(), 0u64..8), 1..64)) {
                let mut t = DescriptorTable::new(8);
                let mut live = BTreeSet::new();
                for (is_insert, index) in ops {
                    if is_insert {
                        let expected = (0..8usize).find(|i| !live.contains(i));
                        match (t.insert(fake(0)), expected) {
                            (Ok(got), Some(want)) => {
                                prop_assert_eq!(got, want);
                                live.insert(got);
                            },
                            (Err(_), None) => {},
                            (got, want) => prop_assert!(false, "got {:?}, want {:?}", got.ok(), want),
                        }
                    } else {
                        let released = t.release(index, close_ok).is_ok();
                        prop_assert_eq!(released, live.remove(&(index as usize)));
                    }
                    prop_assert_eq!(t.len(), live.len());
                }
            }
        }
    }
}
