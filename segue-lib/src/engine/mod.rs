//! Block mixer hosting the voices queues are played on.
//!
//! The engine owns a fixed-size voice table. Each voice is rendered into a
//! zeroed scratch block once per [`Engine::mix`] call and summed into the
//! output, so a voice that writes nothing contributes silence.

use log::{info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::constants::PLAY_INDEX_MASK;
use crate::error::PlaybackError;

mod handle;
mod settings;

pub use handle::VoiceHandle;
pub use settings::EngineSettings;

/// Render-side unit scheduled in the voice table.
pub trait Voice: Send + Sync {
    /// Write one block of interleaved samples into `buffer`.
    ///
    /// `buffer` arrives zeroed; samples that are not written stay silent.
    fn render(&self, buffer: &mut [f32]);

    fn has_ended(&self) -> bool;

    /// Protected voices stay in the table after they report an end.
    fn is_protected(&self) -> bool {
        false
    }
}

/// Something the engine can play by creating a voice for it.
pub trait VoiceSource {
    /// Record the engine this source is now playing through.
    fn attach(&self, engine: &Arc<Engine>);

    fn create_voice(&self) -> Arc<dyn Voice>;
}

struct ActiveVoice {
    voice: Arc<dyn Voice>,
    play_index: u32,
}

struct VoiceTable {
    slots: Vec<Option<ActiveVoice>>,
    play_index: u32,
}

#[derive(Default)]
struct RenderScratch {
    block: Vec<f32>,
    voices: Vec<Arc<dyn Voice>>,
}

/// Minimal mixing engine: voice table, handles and source identities.
pub struct Engine {
    settings: EngineSettings,
    voices: Mutex<VoiceTable>,
    scratch: Mutex<RenderScratch>,
    next_source_id: AtomicU32,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("active_voices", &self.active_voice_count())
            .finish()
    }
}

impl Engine {
    /// Create an engine after validating `settings`.
    pub fn new(settings: EngineSettings) -> Result<Arc<Self>, PlaybackError> {
        settings.validate()?;
        let slots = (0..settings.max_voices).map(|_| None).collect();

        Ok(Arc::new(Self {
            voices: Mutex::new(VoiceTable {
                slots,
                play_index: 0,
            }),
            scratch: Mutex::new(RenderScratch {
                block: Vec::with_capacity(settings.block_samples()),
                voices: Vec::with_capacity(settings.max_voices),
            }),
            next_source_id: AtomicU32::new(1),
            settings,
        }))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start playing `source` on a free voice.
    ///
    /// The voice is created before the table is locked, so a source may stop
    /// its previous voice from inside [`VoiceSource::create_voice`].
    pub fn play(self: &Arc<Self>, source: &dyn VoiceSource) -> Result<VoiceHandle, PlaybackError> {
        source.attach(self);
        let voice = source.create_voice();

        let mut table = self.lock_voices();
        let Some(slot) = table.slots.iter().position(Option::is_none) else {
            drop(table);
            warn!("no free voice slot ({} in use)", self.settings.max_voices);
            return Err(PlaybackError::OutOfResources);
        };

        let play_index = table.play_index;
        table.play_index = (play_index + 1) & PLAY_INDEX_MASK;
        table.slots[slot] = Some(ActiveVoice { voice, play_index });
        drop(table);

        let handle = VoiceHandle::new(slot, play_index);
        info!("voice started: handle={} slot={}", handle, slot);
        Ok(handle)
    }

    /// Stop the voice behind `handle`. Returns false for a stale handle.
    pub fn stop(&self, handle: VoiceHandle) -> bool {
        let mut table = self.lock_voices();
        let removed = match handle.slot() {
            Some(slot) if Self::matches(&table, slot, handle) => table.slots[slot].take(),
            _ => None,
        };
        drop(table);

        if removed.is_some() {
            info!("voice stopped: handle={}", handle);
        }
        removed.is_some()
    }

    /// Stop `voice` wherever it resides in the table.
    pub fn stop_voice(&self, voice: &Arc<dyn Voice>) -> bool {
        let mut table = self.lock_voices();
        let removed = table
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(active) if Arc::ptr_eq(&active.voice, voice)))
            .and_then(Option::take);
        drop(table);
        removed.is_some()
    }

    pub fn stop_all(&self) {
        let mut table = self.lock_voices();
        let removed: Vec<_> = table.slots.iter_mut().filter_map(Option::take).collect();
        drop(table);
        if !removed.is_empty() {
            info!("stopped {} voices", removed.len());
        }
    }

    /// Scan the voice table for `voice` and build its handle.
    pub fn handle_of(&self, voice: &Arc<dyn Voice>) -> Option<VoiceHandle> {
        let table = self.lock_voices();
        table
            .slots
            .iter()
            .enumerate()
            .find_map(|(slot, active)| match active {
                Some(active) if Arc::ptr_eq(&active.voice, voice) => {
                    Some(VoiceHandle::new(slot, active.play_index))
                }
                _ => None,
            })
    }

    pub fn is_valid_voice_handle(&self, handle: VoiceHandle) -> bool {
        let table = self.lock_voices();
        handle
            .slot()
            .is_some_and(|slot| Self::matches(&table, slot, handle))
    }

    pub fn active_voice_count(&self) -> usize {
        self.lock_voices().slots.iter().flatten().count()
    }

    /// Next source identity tag; never returns `0`.
    pub fn next_source_id(&self) -> u32 {
        let id = self.next_source_id.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            return self.next_source_id.fetch_add(1, Ordering::Relaxed);
        }
        id
    }

    /// Render one block of interleaved output from every active voice.
    ///
    /// The voice table is locked only to snapshot the active voices and to
    /// reap finished ones, never while a voice renders.
    pub fn mix(&self, out: &mut [f32]) {
        out.fill(0.0);

        let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        let RenderScratch { block, voices } = &mut *scratch;
        {
            let table = self.lock_voices();
            voices.extend(table.slots.iter().flatten().map(|active| active.voice.clone()));
        }

        block.resize(out.len(), 0.0);
        let volume = self.settings.global_volume;
        for voice in voices.iter() {
            block.fill(0.0);
            voice.render(block);
            for (mixed, sample) in out.iter_mut().zip(block.iter()) {
                *mixed += sample * volume;
            }
        }

        for voice in voices.iter() {
            if !voice.is_protected() && voice.has_ended() {
                self.stop_voice(voice);
            }
        }
        voices.clear();
    }

    fn matches(table: &VoiceTable, slot: usize, handle: VoiceHandle) -> bool {
        matches!(
            table.slots.get(slot),
            Some(Some(active)) if active.play_index == handle.play_index()
        )
    }

    fn lock_voices(&self) -> MutexGuard<'_, VoiceTable> {
        self.voices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct ConstantVoice {
        value: f32,
        blocks_left: Mutex<usize>,
        protected: bool,
    }

    impl ConstantVoice {
        fn new(value: f32, blocks: usize, protected: bool) -> Arc<Self> {
            Arc::new(Self {
                value,
                blocks_left: Mutex::new(blocks),
                protected,
            })
        }
    }

    impl Voice for ConstantVoice {
        fn render(&self, buffer: &mut [f32]) {
            let mut left = self.blocks_left.lock().unwrap();
            if *left == 0 {
                return;
            }
            *left -= 1;
            buffer.fill(self.value);
        }

        fn has_ended(&self) -> bool {
            *self.blocks_left.lock().unwrap() == 0
        }

        fn is_protected(&self) -> bool {
            self.protected
        }
    }

    struct TestSource {
        voice: Arc<ConstantVoice>,
        attached: AtomicBool,
    }

    impl TestSource {
        fn new(voice: Arc<ConstantVoice>) -> Self {
            Self {
                voice,
                attached: AtomicBool::new(false),
            }
        }
    }

    impl VoiceSource for TestSource {
        fn attach(&self, _engine: &Arc<Engine>) {
            self.attached.store(true, Ordering::SeqCst);
        }

        fn create_voice(&self) -> Arc<dyn Voice> {
            self.voice.clone()
        }
    }

    fn engine(max_voices: usize) -> Arc<Engine> {
        let mut settings = EngineSettings::new(1, 48_000);
        settings.max_voices = max_voices;
        Engine::new(settings).expect("engine")
    }

    #[test]
    fn play_attaches_source_and_returns_valid_handle() {
        let engine = engine(2);
        let source = TestSource::new(ConstantVoice::new(0.5, 4, false));

        let handle = engine.play(&source).expect("play");
        assert!(source.attached.load(Ordering::SeqCst));
        assert!(engine.is_valid_voice_handle(handle));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    fn play_fails_when_voice_table_is_full() {
        let engine = engine(1);
        let first = TestSource::new(ConstantVoice::new(0.5, 4, false));
        let second = TestSource::new(ConstantVoice::new(0.5, 4, false));

        engine.play(&first).expect("first");
        assert_eq!(engine.play(&second), Err(PlaybackError::OutOfResources));
    }

    #[test]
    fn stale_handle_does_not_match_reused_slot() {
        let engine = engine(1);
        let first = TestSource::new(ConstantVoice::new(0.5, 4, false));
        let second = TestSource::new(ConstantVoice::new(0.5, 4, false));

        let old = engine.play(&first).expect("first");
        assert!(engine.stop(old));
        let new = engine.play(&second).expect("second");

        assert_ne!(old, new);
        assert!(!engine.is_valid_voice_handle(old));
        assert!(!engine.stop(old));
        assert!(engine.is_valid_voice_handle(new));
    }

    #[test]
    fn handle_of_finds_voice_by_identity() {
        let engine = engine(4);
        let voice = ConstantVoice::new(0.5, 4, false);
        let source = TestSource::new(voice.clone());
        let handle = engine.play(&source).expect("play");

        let as_dyn: Arc<dyn Voice> = voice;
        assert_eq!(engine.handle_of(&as_dyn), Some(handle));

        let stranger: Arc<dyn Voice> = ConstantVoice::new(0.5, 4, false);
        assert_eq!(engine.handle_of(&stranger), None);
    }

    #[test]
    fn mix_sums_voices_with_volume() {
        let mut settings = EngineSettings::new(1, 48_000);
        settings.global_volume = 0.5;
        let engine = Engine::new(settings).expect("engine");
        engine
            .play(&TestSource::new(ConstantVoice::new(0.25, 4, false)))
            .expect("first");
        engine
            .play(&TestSource::new(ConstantVoice::new(0.5, 4, false)))
            .expect("second");

        let mut out = [1.0_f32; 4];
        engine.mix(&mut out);
        assert_eq!(out, [0.375; 4]);
    }

    #[test]
    fn mix_reaps_ended_voices_unless_protected() {
        let engine = engine(4);
        engine
            .play(&TestSource::new(ConstantVoice::new(0.5, 1, false)))
            .expect("plain");
        engine
            .play(&TestSource::new(ConstantVoice::new(0.5, 1, true)))
            .expect("protected");

        let mut out = [0.0_f32; 8];
        engine.mix(&mut out);
        assert_eq!(engine.active_voice_count(), 1);

        engine.mix(&mut out);
        assert_eq!(out, [0.0; 8]);
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    fn source_ids_increase_from_one() {
        let engine = engine(1);
        assert_eq!(engine.next_source_id(), 1);
        assert_eq!(engine.next_source_id(), 2);
    }

    #[test]
    fn stop_all_clears_table() {
        let engine = engine(3);
        for _ in 0..3 {
            engine
                .play(&TestSource::new(ConstantVoice::new(0.1, 2, true)))
                .expect("play");
        }
        engine.stop_all();
        assert_eq!(engine.active_voice_count(), 0);
    }
}
