//! Render-side half of a queue.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ring::Ring;
use super::SeamMode;
use crate::engine::Voice;
use crate::source::Playable;

/// The voice a [`super::Queue`] plays on.
///
/// All state lives in the ring shared with the queue. Pulling from the head
/// unit happens with the ring unlocked: the unit is checked out, pulled, and
/// then either returned to its slot or retired. Retired units are dropped
/// after the lock is released.
pub struct QueueVoice<const N: usize> {
    ring: Arc<Mutex<Ring<N>>>,
    seam_mode: SeamMode,
}

impl<const N: usize> QueueVoice<N> {
    pub(crate) fn new(ring: Arc<Mutex<Ring<N>>>, seam_mode: SeamMode) -> Self {
        Self { ring, seam_mode }
    }

    pub fn seam_mode(&self) -> SeamMode {
        self.seam_mode
    }

    /// Render one block from the head of the queue.
    ///
    /// An empty queue leaves `buffer` untouched. With
    /// [`SeamMode::BlockBoundary`] a unit that ends mid-block is retired and
    /// the rest of the block is left as-is; the next unit starts on the next
    /// call. With [`SeamMode::SampleAccurate`] the next unit continues
    /// filling the same block.
    pub fn render(&self, buffer: &mut [f32]) {
        let Some(mut unit) = self.checkout() else {
            return;
        };

        match self.seam_mode {
            SeamMode::BlockBoundary => {
                unit.pull(buffer);
                self.settle(unit);
            }
            SeamMode::SampleAccurate => {
                let mut offset = 0;
                loop {
                    offset += unit.pull(&mut buffer[offset..]);
                    if !self.settle(unit) || offset >= buffer.len() {
                        break;
                    }
                    match self.checkout() {
                        Some(next) => unit = next,
                        None => break,
                    }
                }
            }
        }
    }

    /// True iff nothing is queued.
    pub fn has_ended(&self) -> bool {
        self.lock_ring().len() == 0
    }

    fn checkout(&self) -> Option<Box<dyn Playable>> {
        self.lock_ring().checkout_head()
    }

    /// Return `unit` to the head slot, or retire it if it has ended.
    ///
    /// Returns true when the unit was retired.
    fn settle(&self, unit: Box<dyn Playable>) -> bool {
        let ended = unit.has_ended();
        let mut ring = self.lock_ring();
        if !ended {
            ring.restore_head(unit);
            return false;
        }

        let retired = ring.retire_head();
        let remaining = ring.len();
        drop(ring);

        drop(unit);
        if let Some(entry) = retired {
            debug!(
                "retired queued source {} ({} remaining)",
                entry.source_id, remaining
            );
        }
        true
    }

    fn lock_ring(&self) -> MutexGuard<'_, Ring<N>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<const N: usize> Voice for QueueVoice<N> {
    fn render(&self, buffer: &mut [f32]) {
        QueueVoice::render(self, buffer);
    }

    fn has_ended(&self) -> bool {
        QueueVoice::has_ended(self)
    }

    fn is_protected(&self) -> bool {
        true
    }
}
