//! Audio files decoded on demand with Symphonia.

use std::path::{Path, PathBuf};

use dasp_ring_buffer::Bounded;
use log::warn;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioSource, Playable, SourceId};
use crate::error::SourceError;

/// Staging capacity used until a packet larger than this is decoded.
const STAGING_SAMPLES: usize = 8192;

/// Template for an audio file on disk.
///
/// The file is probed once when the template is opened to learn its format.
/// Every instance reopens the file and decodes it packet by packet.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    channels: u16,
    sample_rate: u32,
    id: SourceId,
}

impl FileSource {
    /// Probe `path` and build a template for it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let format = get_reader(&path)?;
        let track = default_track(format.as_ref())?;
        let params = &track.codec_params;

        let channels = params
            .channels
            .map(|channels| channels.count() as u16)
            .ok_or_else(|| SourceError::Unsupported("unknown channel layout".to_string()))?;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| SourceError::Unsupported("unknown sample rate".to_string()))?;

        Ok(Self {
            path,
            channels,
            sample_rate,
            id: SourceId::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSource for FileSource {
    fn create_instance(&self) -> Result<Box<dyn Playable>, SourceError> {
        Ok(Box::new(FileInstance::new(&self.path)?))
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

/// Decoding cursor over a [`FileSource`].
///
/// Decoded samples are staged in a bounded ring and handed out in
/// interleaved order. After each pull one packet is decoded ahead if the
/// ring ran dry, so the end of the file is known as soon as it is reached.
pub struct FileInstance {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    staging: Bounded<Vec<f32>>,
    exhausted: bool,
}

impl FileInstance {
    fn new(path: &Path) -> Result<Self, SourceError> {
        let format = get_reader(path)?;
        let track = default_track(format.as_ref())?;
        let track_id = track.id;
        let decoder = get_decoder(&track.codec_params)?;

        Ok(Self {
            format,
            decoder,
            track_id,
            staging: Bounded::from(vec![0.0; STAGING_SAMPLES]),
            exhausted: false,
        })
    }

    /// Decode the next packet of the selected track into the staging ring.
    ///
    /// Only called while the ring is empty.
    fn decode_next(&mut self) {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    return;
                }
                Err(err) => {
                    warn!("failed to read packet: {}", err);
                    self.exhausted = true;
                    return;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);

                    let samples = buffer.samples();
                    if samples.is_empty() {
                        continue;
                    }
                    if samples.len() > self.staging.max_len() {
                        self.staging = Bounded::from(vec![0.0; samples.len()]);
                    }
                    for sample in samples.iter().copied() {
                        self.staging.push(sample);
                    }
                    return;
                }
                Err(Error::DecodeError(err)) => {
                    warn!("decode error: {}", err);
                }
                Err(err) => {
                    warn!("error: {}", err);
                    self.exhausted = true;
                    return;
                }
            }
        }
    }
}

impl Playable for FileInstance {
    fn pull(&mut self, buffer: &mut [f32]) -> usize {
        let mut written = 0;
        while written < buffer.len() {
            match self.staging.pop() {
                Some(sample) => {
                    buffer[written] = sample;
                    written += 1;
                }
                None if self.exhausted => break,
                None => self.decode_next(),
            }
        }

        if self.staging.is_empty() && !self.exhausted {
            self.decode_next();
        }
        written
    }

    fn has_ended(&self) -> bool {
        self.exhausted && self.staging.is_empty()
    }
}

/// Build a Symphonia `FormatReader` for the given file path.
fn get_reader(path: &Path) -> Result<Box<dyn FormatReader>, SourceError> {
    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    // Use the file's extension as a probe hint.
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    Ok(probed.format)
}

/// First audio track with a known (decodeable) codec.
fn default_track(
    format: &dyn FormatReader,
) -> Result<&symphonia::core::formats::Track, SourceError> {
    format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SourceError::Unsupported("no supported audio tracks".to_string()))
}

fn get_decoder(
    params: &symphonia::core::codecs::CodecParameters,
) -> Result<Box<dyn Decoder>, SourceError> {
    let dec_opts: DecoderOptions = Default::default();
    Ok(symphonia::default::get_codecs().make(params, &dec_opts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn test_file_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        std::env::temp_dir().join(format!("segue-{}-{}.wav", name, nanos))
    }

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for sample in samples {
            writer.write_sample(*sample).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn probes_format_from_file() {
        let path = test_file_path("probe");
        write_wav(&path, 2, 22_050, &[0; 64]);

        let source = FileSource::open(&path).expect("open");
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 22_050);
        assert_eq!(source.path(), path.as_path());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn decodes_every_sample_then_ends() {
        let path = test_file_path("decode");
        let input: Vec<i16> = (0..1000).map(|i| if i % 2 == 0 { 16384 } else { -16384 }).collect();
        write_wav(&path, 1, 44_100, &input);

        let source = FileSource::open(&path).expect("open");
        let mut instance = source.create_instance().expect("instance");
        let mut decoded = Vec::new();
        let mut block = [0.0_f32; 128];
        while !instance.has_ended() {
            let written = instance.pull(&mut block);
            decoded.extend_from_slice(&block[..written]);
            if written == 0 {
                break;
            }
        }

        assert!(instance.has_ended());
        assert_eq!(decoded.len(), input.len());
        assert!((decoded[0] - 0.5).abs() < 1e-6);
        assert!((decoded[1] + 0.5).abs() < 1e-6);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = test_file_path("missing");
        let err = FileSource::open(&path).expect_err("missing file");
        assert!(matches!(err, SourceError::Io(_)));
    }
}
