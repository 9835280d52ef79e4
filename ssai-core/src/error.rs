use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::adinsertion::AdInsertionError;
use crate::encoding::EncodingError;
use crate::feed::FeedError;
use crate::playback::PlaybackError;
use crate::readiness::ProbeError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
    #[error("environment variable {var} is not set")]
    MissingEnv { var: String },
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("ad insertion error: {0}")]
    AdInsertion(#[from] AdInsertionError),
    #[error("readiness error: {0}")]
    Readiness(#[from] ProbeError),
    #[error("playback url error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

pub type Result<T> = std::result::Result<T, Error>;
