//! Error types for fxchain

use thiserror::Error;

use crate::chain::EffectKind;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("Zero-length buffer cannot be transformed")]
    InvalidBufferLength,
    #[error("Signal has no dynamic range to renormalize")]
    DegenerateRange,
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),
    #[error("Parameter '{key}' must be {expected}")]
    ParameterOverrideTypeMismatch { key: String, expected: &'static str },
    #[error("Effect '{0}' needs a spectral processor but none is configured")]
    SpectralUnavailable(EffectKind),
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Spectral processing error: {0}")]
    Spectral(String),
}

pub type Result<T> = std::result::Result<T, FxError>;
