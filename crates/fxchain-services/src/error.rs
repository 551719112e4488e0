//! Service-layer error types

use fxchain_core::FxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Fx(#[from] FxError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
