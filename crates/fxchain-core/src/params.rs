//! Parameter overrides and per-effect configuration records
//!
//! Overrides arrive as a flat map keyed `{effect}_{param}` (e.g.
//! `flanger_depth`). Each effect resolves its own record once, before any
//! processing starts. Values are only type-checked; out-of-range numbers are
//! passed through to the algorithms untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FxError, Result};

/// A single override value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Flat override map, keyed `{effect}_{param}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectParams {
    values: BTreeMap<String, ParamValue>,
}

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric override for `{effect}_{name}`, if present
    pub fn number(&self, effect: &str, name: &str) -> Result<Option<f64>> {
        let key = format!("{effect}_{name}");
        match self.values.get(&key) {
            None => Ok(None),
            Some(ParamValue::Number(v)) => Ok(Some(*v)),
            Some(_) => Err(FxError::ParameterOverrideTypeMismatch { key, expected: "a number" }),
        }
    }

    /// Boolean override for `{effect}_{name}`. Numbers count as true when nonzero.
    pub fn flag(&self, effect: &str, name: &str) -> Result<Option<bool>> {
        let key = format!("{effect}_{name}");
        match self.values.get(&key) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(ParamValue::Number(v)) => Ok(Some(*v != 0.0)),
            Some(ParamValue::Text(_)) => {
                Err(FxError::ParameterOverrideTypeMismatch { key, expected: "a boolean or number" })
            }
        }
    }

    fn number_or(&self, effect: &str, name: &str, default: f32) -> Result<f32> {
        Ok(self.number(effect, name)?.map(|v| v as f32).unwrap_or(default))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for EffectParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// ============================================================================
// Modulated delays
// ============================================================================

/// Flanger settings. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlangerParams {
    pub frequency: f32,
    pub dry: f32,
    pub wet: f32,
    pub depth_ms: f32,
    pub delay_ms: f32,
}

impl Default for FlangerParams {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            dry: 0.3,
            wet: 0.7,
            depth_ms: 10.0,
            delay_ms: 1.0,
        }
    }
}

impl FlangerParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            frequency: params.number_or("flanger", "frequency", d.frequency)?,
            dry: params.number_or("flanger", "dry", d.dry)?,
            wet: params.number_or("flanger", "wet", d.wet)?,
            depth_ms: params.number_or("flanger", "depth", d.depth_ms)?,
            delay_ms: params.number_or("flanger", "delay", d.delay_ms)?,
        })
    }
}

/// Chorus settings. Same shape as the flanger, slower and further back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusParams {
    pub frequency: f32,
    pub dry: f32,
    pub wet: f32,
    pub depth_ms: f32,
    pub delay_ms: f32,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            dry: 0.5,
            wet: 0.5,
            depth_ms: 0.9,
            delay_ms: 25.0,
        }
    }
}

impl ChorusParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            frequency: params.number_or("chorus", "frequency", d.frequency)?,
            dry: params.number_or("chorus", "dry", d.dry)?,
            wet: params.number_or("chorus", "wet", d.wet)?,
            depth_ms: params.number_or("chorus", "depth", d.depth_ms)?,
            delay_ms: params.number_or("chorus", "delay", d.delay_ms)?,
        })
    }
}

// ============================================================================
// Filter / shaping / amplitude
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WahwahParams {
    /// Damping factor of the state-variable filter
    pub damp: f32,
    /// Lower sweep bound in Hz
    pub min_freq: f32,
    /// Upper sweep bound in Hz
    pub max_freq: f32,
    /// Sweep speed: Hz of center-frequency travel per second
    pub wah_freq: f32,
}

impl Default for WahwahParams {
    fn default() -> Self {
        Self {
            damp: 0.49,
            min_freq: 100.0,
            max_freq: 2000.0,
            wah_freq: 2000.0,
        }
    }
}

impl WahwahParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            damp: params.number_or("wahwah", "damp", d.damp)?,
            min_freq: params.number_or("wahwah", "minf", d.min_freq)?,
            max_freq: params.number_or("wahwah", "maxf", d.max_freq)?,
            wah_freq: params.number_or("wahwah", "wahf", d.wah_freq)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortionParams {
    pub alpha: f32,
}

impl Default for DistortionParams {
    fn default() -> Self {
        Self { alpha: 5.0 }
    }
}

impl DistortionParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        Ok(Self {
            alpha: params.number_or("distortion", "alpha", Self::default().alpha)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloParams {
    /// Modulation depth
    pub alpha: f32,
    /// Modulation rate in Hz
    pub mod_freq: f32,
}

impl Default for TremoloParams {
    fn default() -> Self {
        Self { alpha: 1.0, mod_freq: 10.0 }
    }
}

impl TremoloParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            alpha: params.number_or("tremolo", "alpha", d.alpha)?,
            mod_freq: params.number_or("tremolo", "modfreq", d.mod_freq)?,
        })
    }
}

// ============================================================================
// Spectral
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchParams {
    pub semitones: f32,
    /// Average the upward and downward shift
    pub mirror: bool,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self { semitones: 12.0, mirror: false }
    }
}

impl PitchParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            semitones: params.number_or("pitch", "semitones", d.semitones)?,
            mirror: params.flag("pitch", "mirror")?.unwrap_or(d.mirror),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GriffinParams {
    pub iterations: usize,
}

impl GriffinParams {
    pub fn resolve(params: &EffectParams) -> Result<Self> {
        let iterations = match params.number("griffin", "iters")? {
            // Negative or NaN counts run no iterations
            Some(v) if v > 0.0 => v as usize,
            Some(_) => 0,
            None => Self::default().iterations,
        };
        Ok(Self { iterations })
    }
}
