//! Sinusoidal amplitude modulation

use std::f64::consts::TAU;

use crate::params::TremoloParams;
use crate::Signal;

/// Multiply each sample by `1 + alpha·sin(2π·mod_freq·n/sr)`
pub fn tremolo(input: &[f32], sample_rate: u32, params: &TremoloParams) -> Signal {
    let step = TAU * params.mod_freq as f64 / sample_rate as f64;
    let alpha = params.alpha as f64;

    input
        .iter()
        .enumerate()
        .map(|(n, &x)| ((1.0 + alpha * (step * n as f64).sin()) * x as f64) as f32)
        .collect()
}
