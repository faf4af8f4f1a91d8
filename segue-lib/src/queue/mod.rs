//! Gapless playback queue.
//!
//! A [`Queue`] holds up to `N` playable units in a fixed ring and plays them
//! back-to-back on a single [`QueueVoice`]. Producers call [`Queue::play`]
//! from any thread; the engine's render tick drives the voice, which pulls
//! from the head of the ring and retires each unit once it ends.
//!
//! ```no_run
//! use segue_lib::engine::{Engine, EngineSettings};
//! use segue_lib::queue::Queue;
//! use segue_lib::source::SampleSource;
//!
//! let engine = Engine::new(EngineSettings::new(1, 44_100)).unwrap();
//! let queue: Queue = Queue::new();
//! engine.play(&queue).unwrap();
//!
//! let tone = SampleSource::new(1, 44_100, vec![0.25; 4_410]);
//! queue.play(&tone).unwrap();
//!
//! let mut block = vec![0.0; 512];
//! engine.mix(&mut block);
//! ```

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::constants::{MAX_CHANNELS, QUEUE_CAPACITY};
use crate::engine::{Engine, Voice, VoiceHandle, VoiceSource};
use crate::error::PlaybackError;
use crate::source::AudioSource;

mod ring;
mod voice;

use ring::Ring;
pub use voice::QueueVoice;

/// What a voice does when the head unit ends partway through a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeamMode {
    /// Leave the rest of the block as-is; the next unit starts on the next
    /// render call.
    #[default]
    BlockBoundary,
    /// Continue filling the block from the next unit.
    SampleAccurate,
}

/// Output format shared by every unit in a queue.
///
/// No conversion is performed: queued sources are expected to match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for QueueFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

struct Control<const N: usize> {
    engine: Weak<Engine>,
    voice: Option<Arc<QueueVoice<N>>>,
    handle: Option<VoiceHandle>,
    format: QueueFormat,
    seam_mode: SeamMode,
}

/// Control-plane half of a gapless queue with room for `N` units.
pub struct Queue<const N: usize = QUEUE_CAPACITY> {
    ring: Arc<Mutex<Ring<N>>>,
    control: Mutex<Control<N>>,
}

impl<const N: usize> Queue<N> {
    pub fn new() -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring::new())),
            control: Mutex::new(Control {
                engine: Weak::new(),
                voice: None,
                handle: None,
                format: QueueFormat::default(),
                seam_mode: SeamMode::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Replace the queue's voice with a fresh one.
    ///
    /// The previous voice, if any, is stopped in the engine first. Only one
    /// voice exists per queue; this is how a queue is restarted.
    pub fn create_voice(&self) -> Arc<QueueVoice<N>> {
        let mut control = self.lock_control();
        if let Some(old) = control.voice.take() {
            if let Some(engine) = control.engine.upgrade() {
                let old: Arc<dyn Voice> = old;
                engine.stop_voice(&old);
            }
            info!("replacing queue voice");
        }
        control.handle = None;

        let voice = Arc::new(QueueVoice::new(self.ring.clone(), control.seam_mode));
        control.voice = Some(voice.clone());
        voice
    }

    /// Stop the queue's voice in the engine. Queued units are kept.
    pub fn stop(&self) {
        let mut control = self.lock_control();
        control.handle = None;
        let Some(voice) = control.voice.take() else {
            return;
        };
        if let Some(engine) = control.engine.upgrade() {
            let voice: Arc<dyn Voice> = voice;
            if engine.stop_voice(&voice) {
                info!("queue voice stopped");
            }
        }
    }

    /// Enqueue a new playable unit created from `source`.
    ///
    /// Fails without touching the ring when the queue is not bound to an
    /// engine ([`PlaybackError::NotBound`]), its voice is not active in the
    /// engine ([`PlaybackError::InvalidParameter`]), all `N` slots are
    /// taken ([`PlaybackError::QueueFull`]) or the unit cannot be created
    /// ([`PlaybackError::OutOfResources`]).
    pub fn play(&self, source: &dyn AudioSource) -> Result<(), PlaybackError> {
        let engine = self
            .lock_control()
            .engine
            .upgrade()
            .ok_or(PlaybackError::NotBound)?;

        if self.find_queue_handle(&engine).is_none() {
            return Err(PlaybackError::InvalidParameter);
        }

        if self.lock_ring().is_full() {
            return Err(PlaybackError::QueueFull);
        }

        let source_id = source
            .source_id()
            .get_or_assign(|| engine.next_source_id());
        self.check_format(source, source_id);

        // Instantiation may allocate or touch the disk; keep it unlocked.
        let unit = source.create_instance().map_err(|err| {
            warn!("failed to create instance of source {}: {}", source_id, err);
            PlaybackError::OutOfResources
        })?;

        let mut ring = self.lock_ring();
        let pushed = ring.push(source_id, unit);
        let count = ring.len();
        drop(ring);

        match pushed {
            Ok(()) => {
                debug!("queued source {} ({}/{})", source_id, count, N);
                Ok(())
            }
            Err(_unit) => Err(PlaybackError::QueueFull),
        }
    }

    /// Number of queued units, including the one playing.
    ///
    /// The value may be stale as soon as it is returned.
    pub fn count(&self) -> usize {
        self.lock_ring().len()
    }

    /// True if a unit created from `source` is at the head of the queue.
    pub fn is_currently_playing(&self, source: &dyn AudioSource) -> bool {
        let Some(source_id) = source.source_id().get() else {
            return false;
        };
        self.playing_id() == Some(source_id)
    }

    /// Identity tag of the unit at the head of the queue, if any.
    pub fn playing_id(&self) -> Option<u32> {
        self.lock_ring().head_id()
    }

    /// Adopt the format of `source`.
    pub fn set_params_from_source(&self, source: &dyn AudioSource) -> Result<(), PlaybackError> {
        self.set_params(source.sample_rate(), source.channels())
    }

    /// Set the output format. Channel counts outside `1..=MAX_CHANNELS` are
    /// rejected and leave the format unchanged.
    pub fn set_params(&self, sample_rate: u32, channels: u16) -> Result<(), PlaybackError> {
        if !(1..=MAX_CHANNELS).contains(&channels) {
            return Err(PlaybackError::InvalidParameter);
        }
        self.lock_control().format = QueueFormat {
            sample_rate,
            channels,
        };
        Ok(())
    }

    pub fn format(&self) -> QueueFormat {
        self.lock_control().format
    }

    /// Seam policy for voices created after this call.
    pub fn set_seam_mode(&self, seam_mode: SeamMode) {
        self.lock_control().seam_mode = seam_mode;
    }

    pub fn seam_mode(&self) -> SeamMode {
        self.lock_control().seam_mode
    }

    pub fn is_bound(&self) -> bool {
        self.lock_control().engine.strong_count() > 0
    }

    /// Handle of the queue's voice as last resolved by [`Queue::play`].
    pub fn handle(&self) -> Option<VoiceHandle> {
        self.lock_control().handle
    }

    /// Resolve the engine handle of the current voice.
    ///
    /// The voice is attached to the engine's table by the engine itself, so
    /// the lookup may come up empty for a while after a restart; it is
    /// repeated on every call until it succeeds.
    fn find_queue_handle(&self, engine: &Engine) -> Option<VoiceHandle> {
        let (voice, cached) = {
            let control = self.lock_control();
            (control.voice.clone(), control.handle)
        };

        let Some(voice) = voice else {
            self.lock_control().handle = None;
            return None;
        };
        if let Some(handle) = cached {
            if engine.is_valid_voice_handle(handle) {
                return Some(handle);
            }
        }

        let voice: Arc<dyn Voice> = voice;
        let handle = engine.handle_of(&voice);
        self.lock_control().handle = handle;
        handle
    }

    fn check_format(&self, source: &dyn AudioSource, source_id: u32) {
        let format = self.format();
        if source.channels() != format.channels || source.sample_rate() != format.sample_rate {
            warn!(
                "source {} format {}ch/{}Hz does not match queue format {}ch/{}Hz",
                source_id,
                source.channels(),
                source.sample_rate(),
                format.channels,
                format.sample_rate
            );
        }
    }

    fn lock_ring(&self) -> MutexGuard<'_, Ring<N>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_control(&self) -> MutexGuard<'_, Control<N>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<const N: usize> Default for Queue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> VoiceSource for Queue<N> {
    /// Bind the queue to `engine`. Moving to another engine stops the voice
    /// still running in the previous one.
    fn attach(&self, engine: &Arc<Engine>) {
        let mut control = self.lock_control();
        if let Some(previous) = control.engine.upgrade() {
            if !Arc::ptr_eq(&previous, engine) {
                if let Some(voice) = control.voice.take() {
                    let voice: Arc<dyn Voice> = voice;
                    if previous.stop_voice(&voice) {
                        info!("queue voice stopped in previous engine");
                    }
                }
                control.handle = None;
            }
        }
        control.engine = Arc::downgrade(engine);
    }

    fn create_voice(&self) -> Arc<dyn Voice> {
        Queue::create_voice(self)
    }
}

impl<const N: usize> Drop for Queue<N> {
    fn drop(&mut self) {
        self.stop();
    }
}
