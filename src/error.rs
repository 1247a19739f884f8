use std::time::Duration;
use thiserror::Error;

use crate::audio_stream::CaptureError;

/// Problems found while loading or validating configuration.
///
/// These are fatal at configuration time: a pipeline is never started
/// with a configuration that produced one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("analysis resolution {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("unknown window type '{0}'")]
    UnknownWindow(String),

    #[error("unknown color palette '{0}'")]
    UnknownPalette(String),

    #[error("unknown frequency scale '{0}'")]
    UnknownScale(String),

    #[error("capture length {capture_len} is not a non-zero multiple of the half frame ({half_frame})")]
    CaptureLength { capture_len: usize, half_frame: usize },

    #[error("invalid value '{value}' for preference '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("failed to read preferences: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse preferences: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A caller broke a contract the pipeline relies on (wrong chunk length,
    /// frame size mismatch, starting an unprepared recorder).
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("capture worker did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("capture worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
