//! Exponential waveshaping distortion

use tracing::warn;

use crate::error::{FxError, Result};
use crate::Signal;

fn span(signal: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let mut iter = signal.into_iter();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s))))
}

fn widen(signal: &[f32]) -> impl Iterator<Item = f64> + '_ {
    signal.iter().map(|&s| s as f64)
}

/// Affine range mapping in f64, narrowed to f32 on output
fn rescale(source: &[f64], target: &[f32]) -> Result<Signal> {
    let (Some((src_lo, src_hi)), Some((dst_lo, dst_hi))) =
        (span(source.iter().copied()), span(widen(target)))
    else {
        return Ok(Vec::new());
    };

    let src_span = src_hi - src_lo;
    if !(src_span.is_finite() && src_span != 0.0) {
        return Err(FxError::DegenerateRange);
    }
    let dst_span = dst_hi - dst_lo;

    Ok(source
        .iter()
        .map(|&s| ((s - src_lo) / src_span * dst_span + dst_lo) as f32)
        .collect())
}

/// Affinely map `source`'s observed range onto `target`'s observed range.
///
/// Fails with [`FxError::DegenerateRange`] when `source` has zero or
/// non-finite span. Empty input maps to empty output.
pub fn renormalize(source: &[f32], target: &[f32]) -> Result<Signal> {
    let source: Vec<f64> = widen(source).collect();
    rescale(&source, target)
}

/// Scale so the loudest sample reaches magnitude 1. Silence is returned as is.
pub fn normalize_peak(input: &[f32]) -> Signal {
    let peak = input.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    if peak > 0.0 && peak.is_finite() {
        input.iter().map(|s| s / peak).collect()
    } else {
        input.to_vec()
    }
}

/// `sign(x)·(1 − exp(alpha·sign(x)·x))`, rescaled back to the input's range.
///
/// Shaping runs in f64, so `alpha·|x|` up to about 700 still shapes. When the
/// shaped signal is flat (e.g. `alpha == 0`) or overflows, every sample
/// becomes the midpoint of the input's range.
pub fn distortion(input: &[f32], alpha: f32) -> Signal {
    let alpha = alpha as f64;
    let shaped: Vec<f64> = widen(input)
        .map(|x| {
            let q = if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            };
            q * (1.0 - (alpha * q * x).exp())
        })
        .collect();

    match rescale(&shaped, input) {
        Ok(out) => out,
        Err(err) => {
            // rescale only fails on non-empty input
            let (lo, hi) = span(widen(input)).unwrap_or((0.0, 0.0));
            let midpoint = ((lo + hi) / 2.0) as f32;
            warn!(%err, alpha, samples = input.len(), midpoint, "distortion fell back to midpoint");
            vec![midpoint; input.len()]
        }
    }
}
