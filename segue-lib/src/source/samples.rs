//! In-memory sample source.

use std::sync::Arc;

use super::{AudioSource, Playable, SourceId};
use crate::error::SourceError;

/// Template holding interleaved samples in memory.
///
/// Instances share the sample data and only carry their own read cursor.
#[derive(Debug)]
pub struct SampleSource {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    id: SourceId,
}

impl SampleSource {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate,
            id: SourceId::new(),
        }
    }

    /// Number of interleaved samples held by the template.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AudioSource for SampleSource {
    fn create_instance(&self) -> Result<Box<dyn Playable>, SourceError> {
        Ok(Box::new(SampleInstance {
            samples: self.samples.clone(),
            position: 0,
        }))
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn source_id(&self) -> &SourceId {
        &self.id
    }
}

/// Playable cursor over a [`SampleSource`].
#[derive(Debug)]
pub struct SampleInstance {
    samples: Arc<[f32]>,
    position: usize,
}

impl Playable for SampleInstance {
    fn pull(&mut self, buffer: &mut [f32]) -> usize {
        let remaining = &self.samples[self.position..];
        let take = remaining.len().min(buffer.len());
        buffer[..take].copy_from_slice(&remaining[..take]);
        self.position += take;
        take
    }

    fn has_ended(&self) -> bool {
        self.position >= self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_reads_samples_in_order() {
        let source = SampleSource::new(1, 48_000, vec![0.1, 0.2, 0.3]);
        let mut instance = source.create_instance().expect("instance");
        let mut buffer = [0.0_f32; 2];

        assert_eq!(instance.pull(&mut buffer), 2);
        assert_eq!(buffer, [0.1, 0.2]);
        assert!(!instance.has_ended());

        let mut buffer = [9.0_f32; 2];
        assert_eq!(instance.pull(&mut buffer), 1);
        assert_eq!(buffer, [0.3, 9.0]);
        assert!(instance.has_ended());
    }

    #[test]
    fn instances_are_independent() {
        let source = SampleSource::new(1, 48_000, vec![1.0, 2.0]);
        let mut first = source.create_instance().expect("first");
        let mut buffer = [0.0_f32; 2];
        first.pull(&mut buffer);

        let second = source.create_instance().expect("second");
        assert!(first.has_ended());
        assert!(!second.has_ended());
    }

    #[test]
    fn empty_source_has_ended_immediately() {
        let source = SampleSource::new(2, 44_100, Vec::new());
        let instance = source.create_instance().expect("instance");
        assert!(source.is_empty());
        assert!(instance.has_ended());
    }
}
