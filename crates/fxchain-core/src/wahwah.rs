//! Swept state-variable filter (wah-wah)

use std::f64::consts::PI;

use tracing::debug;

use crate::params::WahwahParams;
use crate::Signal;

/// Center frequency for every sample of a `len`-sample buffer.
///
/// One period ramps from `min_freq` up towards `max_freq` in steps of
/// `wah_freq / sample_rate`, then back down from `max_freq`. Periods repeat
/// until `len` is covered and the last one is cut short, so the sweep may jump
/// at the buffer end. An empty ramp (`min_freq >= max_freq`, non-positive
/// step, non-finite bounds) holds `min_freq` throughout.
pub fn center_frequencies(
    len: usize,
    sample_rate: u32,
    min_freq: f32,
    max_freq: f32,
    wah_freq: f32,
) -> Signal {
    let min = min_freq as f64;
    let max = max_freq as f64;
    let delta = wah_freq as f64 / sample_rate as f64;

    let steps = (max - min) / delta;
    let ramp = if delta > 0.0 && steps.is_finite() && steps > 0.0 {
        steps.ceil() as usize
    } else {
        0
    };

    if ramp == 0 {
        return vec![min_freq; len];
    }

    let period = ramp.saturating_mul(2);
    (0..len)
        .map(|n| {
            let k = n % period;
            let f = if k < ramp {
                min + k as f64 * delta
            } else {
                max - (k - ramp) as f64 * delta
            };
            f as f32
        })
        .collect()
}

/// Run the swept filter over `input`.
///
/// The filter coefficient for sample `n` comes from the center frequency of
/// sample `n - 1`; sample 0 uses its own.
pub fn wahwah(input: &[f32], sample_rate: u32, params: &WahwahParams) -> Signal {
    let Some(&first) = input.first() else {
        return Vec::new();
    };

    let centers = center_frequencies(
        input.len(),
        sample_rate,
        params.min_freq,
        params.max_freq,
        params.wah_freq,
    );
    debug!(
        samples = input.len(),
        min_freq = params.min_freq,
        max_freq = params.max_freq,
        "wahwah sweep"
    );

    let rate = sample_rate as f64;
    let damp = params.damp as f64;
    let coefficient = |center: f32| 2.0 * (PI * center as f64 / rate).sin();

    let mut output = Vec::with_capacity(input.len());
    let mut f1 = coefficient(centers[0]);

    let high = first as f64;
    let mut band = f1 * high;
    let mut low = f1 * band;
    output.push(band as f32);

    for (&x, &center) in input.iter().zip(&centers).skip(1) {
        let high = x as f64 - low - 2.0 * damp * band;
        band += f1 * high;
        low += f1 * band;
        output.push(band as f32);
        f1 = coefficient(center);
    }

    output
}
