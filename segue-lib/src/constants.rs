//! Fixed limits shared by the queue and the engine.

/// Default number of slots in a [`crate::queue::Queue`].
pub const QUEUE_CAPACITY: usize = 32;

/// Highest channel count a queue or engine accepts.
pub const MAX_CHANNELS: u16 = 8;

/// Largest voice table the handle encoding can address.
pub const MAX_VOICES: usize = 4095;

/// Bits of a voice handle used for the slot index.
pub(crate) const HANDLE_SLOT_BITS: u32 = 12;

/// Mask applied to the play index before it is shifted into a handle.
pub(crate) const PLAY_INDEX_MASK: u32 = 0xfffff;

pub(crate) const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub(crate) const DEFAULT_CHANNELS: u16 = 2;
pub(crate) const DEFAULT_MAX_VOICES: usize = 16;
pub(crate) const DEFAULT_BLOCK_FRAMES: usize = 512;
