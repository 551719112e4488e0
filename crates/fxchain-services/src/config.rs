//! TOML chain configuration
//!
//! ```toml
//! normalize = true
//!
//! [[chain]]
//! effect = "flanger"
//! mix = 0.5
//!
//! [[chain]]
//! effect = "pitch"
//! mix = 1.0
//!
//! [params]
//! flanger_depth = 4.0
//! pitch_mirror = true
//! ```

use std::path::Path;

use fxchain_core::{EffectChain, EffectParams};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub effect: String,
    pub mix: f32,
}

/// A chain file: steps in order plus a flat override table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Peak-normalize the rendered output
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub chain: Vec<ChainStep>,
    #[serde(default)]
    pub params: EffectParams,
}

impl ChainConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), steps = config.chain.len(), "loaded chain config");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve step names into a chain. Unknown names are rejected here,
    /// before any audio is touched.
    pub fn chain(&self) -> fxchain_core::Result<EffectChain> {
        EffectChain::parse(self.chain.iter().map(|step| (step.effect.as_str(), step.mix)))
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }
}
