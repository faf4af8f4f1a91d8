use std::fmt;
use std::fs;
use std::io;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use clap::ArgMatches;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{error, info, warn};
use rand::seq::SliceRandom;
use rodio::{OutputStreamBuilder, Sink};
use segue_lib::engine::{Engine, EngineSettings};
use segue_lib::output::EngineSource;
use segue_lib::queue::{Queue, SeamMode};
use segue_lib::source::{AudioSource, FileSource};
use segue_lib::{PlaybackError, SourceError};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 3;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 200;
const POLL_INTERVAL_MS: u64 = 50;

/// Failures that abort a CLI run.
#[derive(Debug)]
pub enum RunError {
    Io(io::Error),
    Source(SourceError),
    Playback(PlaybackError),
    Config(serde_json::Error),
    Wav(hound::Error),
    Output(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Io(err) => write!(f, "io error: {}", err),
            RunError::Source(err) => write!(f, "{}", err),
            RunError::Playback(err) => write!(f, "playback error: {}", err),
            RunError::Config(err) => write!(f, "invalid engine settings: {}", err),
            RunError::Wav(err) => write!(f, "wav error: {}", err),
            RunError::Output(message) => write!(f, "output error: {}", message),
        }
    }
}

impl std::error::Error for RunError {}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> Self {
        RunError::Io(err)
    }
}

impl From<SourceError> for RunError {
    fn from(err: SourceError) -> Self {
        RunError::Source(err)
    }
}

impl From<PlaybackError> for RunError {
    fn from(err: PlaybackError) -> Self {
        RunError::Playback(err)
    }
}

impl From<serde_json::Error> for RunError {
    fn from(err: serde_json::Error) -> Self {
        RunError::Config(err)
    }
}

impl From<hound::Error> for RunError {
    fn from(err: hound::Error) -> Self {
        RunError::Wav(err)
    }
}

pub fn run(args: &ArgMatches) -> Result<i32, RunError> {
    match args.subcommand() {
        Some(("play", sub)) => run_play(sub),
        Some(("render", sub)) => run_render(sub),
        Some(("config", _)) => {
            println!("{}", EngineSettings::default().to_json_pretty()?);
            Ok(0)
        }
        _ => {
            error!("no subcommand given");
            Ok(-1)
        }
    }
}

/// An engine with one queue voice and the inputs still waiting to be queued.
struct Session {
    engine: Arc<Engine>,
    queue: Queue,
    sources: Vec<FileSource>,
    next: usize,
    /// Identity tag of the last source logged as playing.
    announced: Option<u32>,
}

impl Session {
    fn open(args: &ArgMatches) -> Result<Option<Self>, RunError> {
        let Some(gain) = parse_gain(args) else {
            error!("gain must be a number");
            return Ok(None);
        };

        let mut sources = args
            .get_many::<String>("INPUT")
            .into_iter()
            .flatten()
            .map(FileSource::open)
            .collect::<Result<Vec<_>, _>>()?;
        if args.get_flag("shuffle") {
            sources.shuffle(&mut rand::thread_rng());
        }
        let Some(first) = sources.first() else {
            error!("no input files");
            return Ok(None);
        };

        let mut settings = match args.get_one::<String>("config") {
            Some(path) => EngineSettings::from_json(&fs::read_to_string(path)?)?,
            None => EngineSettings::default(),
        };
        settings.channels = first.channels();
        settings.sample_rate = first.sample_rate();
        settings.global_volume = gain / 100.0;

        let seam_mode = match args.get_one::<String>("seam").map(String::as_str) {
            Some("sample") => SeamMode::SampleAccurate,
            _ => SeamMode::BlockBoundary,
        };

        let engine = Engine::new(settings)?;
        let queue = Queue::new();
        queue.set_seam_mode(seam_mode);
        engine.play(&queue)?;
        queue.set_params_from_source(first)?;

        info!(
            "queueing {} files at {} Hz, {} channels ({:?})",
            sources.len(),
            first.sample_rate(),
            first.channels(),
            seam_mode
        );

        Ok(Some(Self {
            engine,
            queue,
            sources,
            next: 0,
            announced: None,
        }))
    }

    /// Queue as many waiting inputs as the ring accepts.
    fn top_up(&mut self) -> Result<(), RunError> {
        while let Some(source) = self.sources.get(self.next) {
            match self.queue.play(source) {
                Ok(()) => self.next += 1,
                Err(PlaybackError::QueueFull) => break,
                Err(PlaybackError::OutOfResources) => {
                    warn!("skipping {}", source.path().display());
                    self.next += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn announce(&mut self) {
        let Some(head) = self.queue.playing_id() else {
            return;
        };
        if self.announced == Some(head) {
            return;
        }
        self.announced = Some(head);

        let playing = self.sources[..self.next]
            .iter()
            .find(|source| source.source_id().get() == Some(head));
        if let Some(source) = playing {
            info!("now playing {}", source.path().display());
        }
    }

    fn is_finished(&self) -> bool {
        self.next >= self.sources.len() && self.queue.count() == 0
    }
}

fn parse_gain(args: &ArgMatches) -> Option<f32> {
    args.get_one::<String>("GAIN")
        .map_or(Some(100.0), |gain| gain.parse::<f32>().ok())
}

fn run_render(args: &ArgMatches) -> Result<i32, RunError> {
    let Some(mut session) = Session::open(args)? else {
        return Ok(-1);
    };
    let Some(output) = args.get_one::<String>("output") else {
        error!("no output file given");
        return Ok(-1);
    };

    let settings = session.engine.settings().clone();
    let spec = WavSpec {
        channels: settings.channels,
        sample_rate: settings.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, spec)?;
    let mut block = vec![0.0f32; settings.block_samples()];
    let mut blocks = 0usize;

    loop {
        session.top_up()?;
        if session.is_finished() {
            break;
        }
        session.announce();

        session.engine.mix(&mut block);
        for sample in block.iter().copied() {
            writer.write_sample(sample)?;
        }
        blocks += 1;
    }
    writer.finalize()?;

    info!("rendered {} blocks to {}", blocks, output);
    Ok(0)
}

fn run_play(args: &ArgMatches) -> Result<i32, RunError> {
    let Some(mut session) = Session::open(args)? else {
        return Ok(-1);
    };
    session.top_up()?;

    let mut stream = None;
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    return Err(RunError::Output(err.to_string()));
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    let Some(stream) = stream else {
        return Err(RunError::Output("no output stream".to_string()));
    };

    let sink = Sink::connect_new(stream.mixer());
    sink.append(EngineSource::new(session.engine.clone()));

    while !session.is_finished() {
        session.top_up()?;
        session.announce();
        sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }

    sink.stop();
    session.engine.stop_all();
    info!("playback finished");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::build_cli;

    #[test]
    fn gain_defaults_to_unity() {
        let matches = build_cli()
            .try_get_matches_from(["segue", "play", "a.wav"])
            .expect("parse");
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(parse_gain(sub), Some(100.0));
    }

    #[test]
    fn non_numeric_gain_is_rejected() {
        let matches = build_cli()
            .try_get_matches_from(["segue", "play", "a.wav", "--gain", "loud"])
            .expect("parse");
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(parse_gain(sub), None);
    }

    #[test]
    fn run_error_messages_name_their_origin() {
        let err = RunError::from(PlaybackError::QueueFull);
        assert_eq!(err.to_string(), "playback error: queue is full");
    }
}
