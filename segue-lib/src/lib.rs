//! # Segue
//!
//! Gapless playback queue for a real-time mixing engine.
//!
//! A [`queue::Queue`] holds a bounded sequence of audio sources and plays
//! them back-to-back on a single engine voice. Producers enqueue from any
//! thread; the engine's render tick pulls from the head of the queue and
//! retires each unit once it ends. The [`engine`] module hosts the voices,
//! [`source`] provides sample, `rodio` and file-backed templates, and
//! [`output`] streams the engine into `rodio`.

pub mod constants;
pub mod engine;
pub mod error;
pub mod output;
pub mod queue;
pub mod source;

pub use error::{PlaybackError, SourceError};
