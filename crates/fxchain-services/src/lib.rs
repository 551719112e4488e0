//! fxchain-services: Spectral backend, WAV I/O and chain configuration

pub mod config;
mod error;
pub mod spectral;
pub mod wav;

pub use config::{ChainConfig, ChainStep};
pub use error::{Result, ServiceError};
pub use spectral::StftProcessor;
pub use wav::{decode_mono, read_wav_mono, to_mono, write_wav};
