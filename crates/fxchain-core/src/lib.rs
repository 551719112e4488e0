//! fxchain-core: Offline single-channel effect algorithms and the chain compositor

pub mod chain;
pub mod delay;
pub mod distortion;
mod error;
pub mod params;
pub mod spectral;
pub mod tremolo;
pub mod wahwah;
pub mod waveform;

pub use chain::{ChainEntry, EffectChain, EffectKind, FxEngine};
pub use delay::{chorus, flanger, modulated_delay, DelayPolicy};
pub use distortion::{distortion, normalize_peak, renormalize};
pub use error::{FxError, Result};
pub use params::{
    ChorusParams, DistortionParams, EffectParams, FlangerParams, GriffinParams, ParamValue,
    PitchParams, TremoloParams, WahwahParams,
};
pub use spectral::{fit_length, SpectralProcessor, Spectrogram};
pub use tremolo::tremolo;
pub use wahwah::{center_frequencies, wahwah};
pub use waveform::sine;

/// A mono buffer of samples
pub type Signal = Vec<f32>;
