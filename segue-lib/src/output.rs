//! `rodio` adapter that streams engine output to a sink.

use rodio::Source;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;

/// Endless `rodio` source pulling fixed blocks from [`Engine::mix`].
///
/// Append it to a `rodio::Sink` to hear every voice of the engine; silence
/// is produced while nothing is playing.
pub struct EngineSource {
    engine: Arc<Engine>,
    block: Vec<f32>,
    position: usize,
}

impl EngineSource {
    pub fn new(engine: Arc<Engine>) -> Self {
        let block_samples = engine.settings().block_samples();
        Self {
            engine,
            block: vec![0.0; block_samples],
            position: block_samples,
        }
    }
}

impl Iterator for EngineSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.block.len() {
            self.engine.mix(&mut self.block);
            self.position = 0;
        }
        let sample = self.block[self.position];
        self.position += 1;
        Some(sample)
    }
}

impl Source for EngineSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.engine.settings().channels
    }

    fn sample_rate(&self) -> u32 {
        self.engine.settings().sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
