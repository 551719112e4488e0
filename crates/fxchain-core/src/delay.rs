//! Modulated delay lines (flanger, chorus)
//!
//! Both effects read a tap at `i - round(mod_wave[i])`. The flanger reads its
//! own output as it is written, so earlier taps feed later ones and the sound
//! resonates. The chorus reads the untouched input and only doubles it.

use serde::{Deserialize, Serialize};

use crate::params::{ChorusParams, FlangerParams};
use crate::waveform::sine;
use crate::Signal;

/// Where the delay tap reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayPolicy {
    /// Tap and dry path both read the output written so far
    Feedback,
    /// Tap and dry path both read the original input
    Feedforward,
}

/// Apply a time-varying delay tap.
///
/// `mod_wave[i]` is the delay of sample `i` in (fractional) samples. Taps that
/// land outside the buffer leave the input sample untouched, as do indices
/// past the end of `mod_wave`.
pub fn modulated_delay(
    input: &[f32],
    mod_wave: &[f32],
    dry: f32,
    wet: f32,
    policy: DelayPolicy,
) -> Signal {
    let len = input.len();
    let mut out = input.to_vec();

    for (i, &offset) in mod_wave.iter().enumerate().take(len) {
        // Huge offsets saturate and land out of range
        let delayed = (i as i64).saturating_sub(offset.round() as i64);
        if delayed < 0 || delayed >= len as i64 {
            continue;
        }
        let delayed = delayed as usize;

        out[i] = match policy {
            // Must run in increasing i: out[delayed] may already be rewritten
            DelayPolicy::Feedback => out[i] * dry + out[delayed] * wet,
            DelayPolicy::Feedforward => input[i] * dry + input[delayed] * wet,
        };
    }

    out
}

/// Build a delay curve that swings between `delay_ms` and `delay_ms + depth_ms`
/// at `frequency` Hz over `len` samples.
fn modulation_wave(len: usize, sample_rate: u32, frequency: f32, depth_ms: f32, delay_ms: f32) -> Signal {
    let duration = len as f64 / sample_rate as f64;
    let samples_per_ms = sample_rate as f64 / 1000.0;
    let depth = depth_ms as f64 * samples_per_ms;
    let delay = delay_ms as f64 * samples_per_ms;

    sine(frequency as f64, duration, sample_rate, 0.0)
        .into_iter()
        .map(|s| ((s as f64 / 2.0 + 0.5) * depth + delay) as f32)
        .collect()
}

/// Feedback-modulated delay
pub fn flanger(input: &[f32], sample_rate: u32, params: &FlangerParams) -> Signal {
    let mod_wave = modulation_wave(
        input.len(),
        sample_rate,
        params.frequency,
        params.depth_ms,
        params.delay_ms,
    );
    modulated_delay(input, &mod_wave, params.dry, params.wet, DelayPolicy::Feedback)
}

/// Feedforward-modulated delay
pub fn chorus(input: &[f32], sample_rate: u32, params: &ChorusParams) -> Signal {
    let mod_wave = modulation_wave(
        input.len(),
        sample_rate,
        params.frequency,
        params.depth_ms,
        params.delay_ms,
    );
    modulated_delay(input, &mod_wave, params.dry, params.wet, DelayPolicy::Feedforward)
}
