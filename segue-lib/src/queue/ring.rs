//! Fixed-capacity slot ring shared by a queue and its voice.

use crate::source::Playable;

/// One occupied slot.
///
/// `unit` is `None` while the voice has the head unit checked out for a
/// pull; the slot itself stays occupied.
pub(crate) struct Entry {
    pub(crate) source_id: u32,
    unit: Option<Box<dyn Playable>>,
}

pub(crate) struct Ring<const N: usize> {
    slots: [Option<Entry>; N],
    read_index: usize,
    write_index: usize,
    count: usize,
}

impl<const N: usize> Ring<N> {
    const NON_EMPTY: () = assert!(N > 0, "queue capacity must be non-zero");

    pub(crate) fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            slots: std::array::from_fn(|_| None),
            read_index: 0,
            write_index: 0,
            count: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn is_full(&self) -> bool {
        self.count == N
    }

    /// Store `unit` at the write cursor; gives the unit back when full.
    pub(crate) fn push(
        &mut self,
        source_id: u32,
        unit: Box<dyn Playable>,
    ) -> Result<(), Box<dyn Playable>> {
        if self.is_full() {
            return Err(unit);
        }
        self.slots[self.write_index] = Some(Entry {
            source_id,
            unit: Some(unit),
        });
        self.write_index = (self.write_index + 1) % N;
        self.count += 1;
        Ok(())
    }

    pub(crate) fn head_id(&self) -> Option<u32> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.read_index]
            .as_ref()
            .map(|entry| entry.source_id)
    }

    /// Take the head unit out of its slot so it can be pulled unlocked.
    pub(crate) fn checkout_head(&mut self) -> Option<Box<dyn Playable>> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.read_index]
            .as_mut()
            .and_then(|entry| entry.unit.take())
    }

    /// Put a checked-out head unit back into its slot.
    pub(crate) fn restore_head(&mut self, unit: Box<dyn Playable>) {
        if let Some(entry) = self.slots[self.read_index].as_mut() {
            entry.unit = Some(unit);
        }
    }

    /// Clear the head slot and advance the read cursor.
    ///
    /// The returned entry is meant to be dropped after the lock is released.
    pub(crate) fn retire_head(&mut self) -> Option<Entry> {
        if self.count == 0 {
            return None;
        }
        let entry = self.slots[self.read_index].take();
        self.read_index = (self.read_index + 1) % N;
        self.count -= 1;
        entry
    }
}
