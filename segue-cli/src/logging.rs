use log::{LevelFilter, Log, Metadata, Record};
use std::sync::OnceLock;

struct CliLogger {
    level: LevelFilter,
    echo_stderr: bool,
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) || !self.echo_stderr {
            return;
        }
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<CliLogger> = OnceLock::new();

/// Install the CLI logger.
///
/// The level comes from `RUST_LOG` (default `info`); setting
/// `SEGUE_LOG_STDERR=0` silences output entirely.
pub fn init() {
    let level = parse_level(std::env::var("RUST_LOG").ok().as_deref());

    let echo_stderr = std::env::var("SEGUE_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(true);

    let logger_ref = LOGGER.get_or_init(|| CliLogger { level, echo_stderr });
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_lowercase).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_level;
    use log::LevelFilter;

    #[test]
    fn unknown_or_missing_level_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("verbose")), LevelFilter::Info);
    }

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
    }
}
