//! Periodic modulation sources

use std::f64::consts::TAU;

use crate::Signal;

/// Generate a sine wave
///
/// # Arguments
/// * `frequency` - Oscillation frequency in Hz
/// * `duration_secs` - Length of the wave in seconds
/// * `sample_rate` - Samples per second
/// * `phase` - Start phase in cycles (0.25 = 90°)
///
/// # Returns
/// `round(duration_secs * sample_rate)` samples of `sin(2π·f·t + 2π·phase)`,
/// starting at t=0. A non-positive duration yields an empty signal.
///
/// # Example
/// ```
/// use fxchain_core::sine;
/// let wave = sine(1.0, 1.0, 4, 0.0);
/// assert_eq!(wave.len(), 4);
/// ```
pub fn sine(frequency: f64, duration_secs: f64, sample_rate: u32, phase: f64) -> Signal {
    if !(duration_secs > 0.0) || sample_rate == 0 {
        return Vec::new();
    }

    let len = (duration_secs * sample_rate as f64).round() as usize;
    let omega = TAU * frequency;
    let phase = TAU * phase;
    let rate = sample_rate as f64;

    (0..len)
        .map(|n| (omega * (n as f64 / rate) + phase).sin() as f32)
        .collect()
}
