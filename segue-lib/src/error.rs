//! Error types returned by the queue, the engine, and audio sources.

use std::fmt::{Display, Formatter};

/// Failure of a queue or engine operation.
///
/// Every variant is returned synchronously and leaves the queue unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    /// The queue has not been attached to an engine (or the engine is gone).
    NotBound,
    /// No active voice could be resolved, or a format value is out of range.
    InvalidParameter,
    /// Every slot of the queue is occupied.
    QueueFull,
    /// A playable unit or voice slot could not be created.
    OutOfResources,
}

impl Display for PlaybackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotBound => write!(f, "queue is not bound to an engine"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::QueueFull => write!(f, "queue is full"),
            Self::OutOfResources => write!(f, "out of resources"),
        }
    }
}

impl std::error::Error for PlaybackError {}

/// Error raised while opening an audio source or creating an instance of it.
#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Decode(String),
    Unsupported(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Unsupported(err) => write!(f, "unsupported source: {}", err),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<symphonia::core::errors::Error> for SourceError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match value {
            Error::IoError(err) => Self::Io(err),
            Error::Unsupported(what) => Self::Unsupported(what.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_errors_have_readable_messages() {
        assert_eq!(PlaybackError::QueueFull.to_string(), "queue is full");
        assert_eq!(
            PlaybackError::NotBound.to_string(),
            "queue is not bound to an engine"
        );
    }

    #[test]
    fn symphonia_io_errors_map_to_io() {
        let err = symphonia::core::errors::Error::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(matches!(SourceError::from(err), SourceError::Io(_)));
    }

    #[test]
    fn symphonia_unsupported_maps_to_unsupported() {
        let err = symphonia::core::errors::Error::Unsupported("codec");
        let mapped = SourceError::from(err);
        assert!(matches!(mapped, SourceError::Unsupported(_)));
        assert_eq!(mapped.to_string(), "unsupported source: codec");
    }
}
