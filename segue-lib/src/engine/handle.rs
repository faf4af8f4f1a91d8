use std::fmt::{Display, Formatter};

use crate::constants::{HANDLE_SLOT_BITS, PLAY_INDEX_MASK};

/// Opaque identifier of a voice playing in an [`super::Engine`].
///
/// The low bits address the voice slot, the high bits carry the play index
/// so a handle to a stopped voice never matches a later voice in the same
/// slot. `0` is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(u32);

impl VoiceHandle {
    pub(crate) fn new(slot: usize, play_index: u32) -> Self {
        Self((slot as u32 + 1) | ((play_index & PLAY_INDEX_MASK) << HANDLE_SLOT_BITS))
    }

    pub(crate) fn slot(&self) -> Option<usize> {
        let slot = self.0 & ((1 << HANDLE_SLOT_BITS) - 1);
        (slot as usize).checked_sub(1)
    }

    pub(crate) fn play_index(&self) -> u32 {
        self.0 >> HANDLE_SLOT_BITS
    }

    /// Raw numeric value, suitable for logging or FFI.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Display for VoiceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
