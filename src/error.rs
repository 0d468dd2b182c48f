//! Error kinds surfaced by the orchestration core.
//!
//! One variant per row of the error table in the specification; callers
//! match on these to decide retry/propagation behavior instead of parsing
//! strings.

use std::path::PathBuf;

/// Which half of a driver's power wrapper failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerPhase {
    Pre,
    Post,
}

impl std::fmt::Display for PowerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerPhase::Pre => write!(f, "pre"),
            PowerPhase::Post => write!(f, "post"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("unknown image type '{image_type}'")]
    UnknownImageType { image_type: String },

    #[error("permission denied: '{path}' is outside the configured path whitelist", path = path.display())]
    PermissionDenied { path: PathBuf },

    #[error("source file '{path}' is missing or unreadable", path = path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decompression of '{path}' left an indeterminate (possibly truncated) output; manual recovery required", path = path.display())]
    DecompressionCorrupted { path: PathBuf },

    #[error("driver '{driver}' failed to start")]
    DriverStartFailed {
        driver: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("driver '{driver}' post-check failed: {diagnostic}")]
    PostCheckFailed { driver: String, diagnostic: String },

    #[error("flashing timed out after its deadline ({drivers:?} still running)")]
    Timeout { drivers: Vec<String> },

    #[error("{phase} power sequence failed")]
    PowerSequenceFailed {
        phase: PowerPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation '{operation}' is not supported by this driver")]
    Unsupported { operation: &'static str },

    #[error("alias cycle detected starting at image type '{image_type}'")]
    RegistryCycle { image_type: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlashError>;
