//! Adapter turning any cloneable `rodio` source into a queue template.

use rodio::Source;

use super::{AudioSource, Playable, SourceId};
use crate::error::SourceError;

/// Template wrapping a cloneable [`rodio::Source`].
///
/// Every instance iterates its own clone of the wrapped source, so the
/// template can be enqueued repeatedly.
pub struct RodioSource<S> {
    source: S,
    id: SourceId,
}

impl<S> RodioSource<S>
where
    S: Source + Clone + Send + 'static,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            id: SourceId::new(),
        }
    }
}

impl<S> AudioSource for RodioSource<S>
where
    S: Source + Clone + Send + 'static,
{
    fn create_instance(&self) -> Result<Box<dyn Playable>, SourceError> {
        Ok(Box::new(RodioInstance::new(self.source.clone())))
    }

    fn channels(&self) -> u16 {
        self.source.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn source_id(&self) -> &SourceId {
        &self.id
    }
}

/// Playable iterator over a `rodio` source.
///
/// One sample of look-ahead is kept so the end is reported as soon as the
/// final sample has been pulled.
pub struct RodioInstance<S> {
    source: S,
    pending: Option<f32>,
}

impl<S: Source> RodioInstance<S> {
    fn new(mut source: S) -> Self {
        let pending = source.next();
        Self { source, pending }
    }
}

impl<S> Playable for RodioInstance<S>
where
    S: Source + Send,
{
    fn pull(&mut self, buffer: &mut [f32]) -> usize {
        let mut written = 0;
        while written < buffer.len() {
            let Some(sample) = self.pending else {
                break;
            };
            buffer[written] = sample;
            written += 1;
            self.pending = self.source.next();
        }
        written
    }

    fn has_ended(&self) -> bool {
        self.pending.is_none()
    }
}
