//! Audio source templates and the playable units they instantiate.
//!
//! A template ([`AudioSource`]) describes audio; every call to
//! [`AudioSource::create_instance`] produces an independent, stateful
//! [`Playable`] that a queue owns until it is retired.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::SourceError;

mod file;
mod rodio_source;
mod samples;

pub use file::{FileInstance, FileSource};
pub use rodio_source::{RodioInstance, RodioSource};
pub use samples::{SampleInstance, SampleSource};

/// Instantiated, stateful generator of interleaved samples.
pub trait Playable: Send {
    /// Write up to `buffer.len()` interleaved samples into `buffer`.
    ///
    /// Returns the number of samples written. Samples past that count are
    /// left untouched.
    fn pull(&mut self, buffer: &mut [f32]) -> usize;

    /// True once every sample of the unit has been pulled.
    fn has_ended(&self) -> bool;
}

/// Template from which playable units are created.
pub trait AudioSource {
    /// Create a fresh playable unit positioned at the start of the audio.
    fn create_instance(&self) -> Result<Box<dyn Playable>, SourceError>;

    /// Interleaved channel count of the produced samples.
    fn channels(&self) -> u16;

    /// Sample rate of the produced samples, in Hz.
    fn sample_rate(&self) -> u32;

    /// Identity tag used to ask a queue whether this template is playing.
    fn source_id(&self) -> &SourceId;
}

/// Lazily assigned identity of an [`AudioSource`].
///
/// The tag is `0` until the template is first enqueued; after that it never
/// changes.
#[derive(Debug, Default)]
pub struct SourceId(AtomicU32);

impl SourceId {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// The assigned tag, or `None` for a template that was never enqueued.
    pub fn get(&self) -> Option<u32> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Return the assigned tag, assigning `next()` first if there is none.
    ///
    /// Concurrent first calls agree on a single winner.
    pub fn get_or_assign(&self, next: impl FnOnce() -> u32) -> u32 {
        if let Some(id) = self.get() {
            return id;
        }
        let candidate = next();
        match self
            .0
            .compare_exchange(0, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => candidate,
            Err(existing) => existing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SourceId;

    #[test]
    fn source_id_starts_unassigned() {
        let id = SourceId::new();
        assert_eq!(id.get(), None);
    }

    #[test]
    fn source_id_is_assigned_once() {
        let id = SourceId::new();
        assert_eq!(id.get_or_assign(|| 7), 7);
        assert_eq!(id.get_or_assign(|| 9), 7);
        assert_eq!(id.get(), Some(7));
    }
}
