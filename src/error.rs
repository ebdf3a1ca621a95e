use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a single item. Layout overflow, font fallback and a
/// missing logo are warnings and never surface here.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot probe media {path}: {reason}")]
    MediaProbe { path: PathBuf, reason: String },

    #[error("cannot load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    #[error("encoder failed for {source_path}: {reason}")]
    EncodeProcess { source_path: PathBuf, reason: String },

    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("config: {0}")]
    Config(String),
}

impl ComposeError {
    pub(crate) fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ComposeError::MediaProbe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ComposeError::EncodeProcess {
            source_path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ComposeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, ComposeError::Config(_))
    }
}

pub type Result<T, E = ComposeError> = std::result::Result<T, E>;
