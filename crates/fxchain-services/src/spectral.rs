//! STFT-based spectral processor (phase vocoder, Griffin-Lim, pitch shift)

use std::f32::consts::TAU;
use std::sync::Arc;

use fxchain_core::{fit_length, FxError, Result, Signal, SpectralProcessor, Spectrogram};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

const DEFAULT_N_FFT: usize = 2048;
const DEFAULT_HOP: usize = 512;
const DEFAULT_MOMENTUM: f32 = 0.99;
const DEFAULT_SEED: u64 = 0x5EED_F00D;
const RESAMPLE_SINC_LEN: usize = 256;

type Frames = Vec<Vec<Complex32>>;

/// FFT plans and window for one call
struct Transforms {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

/// Spectral backend built on a Hann-windowed, centered STFT.
///
/// Griffin-Lim starts from random phases drawn from a seeded generator, so
/// the same input always reconstructs to the same output.
#[derive(Debug, Clone)]
pub struct StftProcessor {
    n_fft: usize,
    hop: usize,
    momentum: f32,
    seed: u64,
}

impl Default for StftProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_N_FFT, DEFAULT_HOP)
    }
}

impl StftProcessor {
    /// `n_fft` is rounded up to an even size of at least 2; `hop` is at least 1
    pub fn new(n_fft: usize, hop: usize) -> Self {
        Self {
            n_fft: n_fft.max(2).next_multiple_of(2),
            hop: hop.max(1),
            momentum: DEFAULT_MOMENTUM,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Griffin-Lim momentum; 0.0 gives the classic algorithm
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn transforms(&self) -> Transforms {
        let mut planner = FftPlanner::<f32>::new();
        let n = self.n_fft;
        // Periodic Hann
        let window = (0..n)
            .map(|i| 0.5 - 0.5 * (TAU * i as f32 / n as f32).cos())
            .collect();
        Transforms {
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
            window,
        }
    }

    /// Half-spectrum frames of `input`, zero-padded by `n_fft / 2` on both sides
    fn stft(&self, t: &Transforms, input: &[f32]) -> Frames {
        let n = self.n_fft;
        let pad = n / 2;
        let bins = self.num_bins();

        let mut padded = vec![0.0; input.len() + 2 * pad];
        padded[pad..pad + input.len()].copy_from_slice(input);
        let num_frames = 1 + (padded.len() - n) / self.hop;

        let mut buffer = vec![Complex32::default(); n];
        (0..num_frames)
            .map(|frame| {
                let start = frame * self.hop;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    *slot = Complex32::new(padded[start + i] * t.window[i], 0.0);
                }
                t.forward.process(&mut buffer);
                buffer[..bins].to_vec()
            })
            .collect()
    }

    /// Overlap-add resynthesis. Without `length` the result covers
    /// `hop * (frames - 1)` samples; with it, the result is padded or cut to fit.
    fn istft(&self, t: &Transforms, frames: &Frames, length: Option<usize>) -> Signal {
        let n = self.n_fft;
        let pad = n / 2;
        let bins = self.num_bins();

        if frames.is_empty() {
            return vec![0.0; length.unwrap_or(0)];
        }

        let full = n + self.hop * (frames.len() - 1);
        let mut output = vec![0.0f32; full];
        let mut window_sum = vec![0.0f32; full];
        let mut buffer = vec![Complex32::default(); n];
        let scale = 1.0 / n as f32;

        for (index, frame) in frames.iter().enumerate() {
            buffer[..bins].copy_from_slice(&frame[..bins]);
            buffer[0].im = 0.0;
            buffer[n / 2].im = 0.0;
            for k in 1..n / 2 {
                buffer[n - k] = buffer[k].conj();
            }
            t.inverse.process(&mut buffer);

            let start = index * self.hop;
            for (i, w) in t.window.iter().enumerate() {
                output[start + i] += buffer[i].re * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &sum) in output.iter_mut().zip(&window_sum) {
            if sum > f32::MIN_POSITIVE {
                *sample /= sum;
            }
        }

        match length {
            Some(len) => fit_length(output[pad..].to_vec(), len),
            None => output[pad..full - pad].to_vec(),
        }
    }

    /// Resample a stretched frame sequence onto steps of `rate` frames,
    /// carrying phase forward so partials stay coherent
    fn phase_vocoder(&self, frames: &Frames, rate: f64) -> Frames {
        let bins = self.num_bins();
        let expected_advance: Vec<f32> = (0..bins)
            .map(|k| TAU * self.hop as f32 * k as f32 / self.n_fft as f32)
            .collect();
        let silence = vec![Complex32::default(); bins];
        let column = |i: usize| frames.get(i).unwrap_or(&silence);

        let mut phase: Vec<f32> = frames[0].iter().map(|c| c.arg()).collect();
        let steps = (frames.len() as f64 / rate).ceil() as usize;
        let mut stretched = Vec::with_capacity(steps);

        for step in 0..steps {
            let position = step as f64 * rate;
            let index = position as usize;
            let alpha = (position - index as f64) as f32;
            let (left, right) = (column(index), column(index + 1));

            let frame = (0..bins)
                .map(|k| {
                    let magnitude = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
                    let value = Complex32::from_polar(magnitude, phase[k]);

                    let mut deviation = right[k].arg() - left[k].arg() - expected_advance[k];
                    deviation -= TAU * (deviation / TAU).round();
                    phase[k] += expected_advance[k] + deviation;
                    value
                })
                .collect();
            stretched.push(frame);
        }

        stretched
    }

    fn griffin_lim(&self, t: &Transforms, magnitudes: &[Vec<f32>], iterations: usize) -> Signal {
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut angles: Frames = magnitudes
            .iter()
            .map(|frame| frame.iter().map(|_| Complex32::from_polar(1.0, TAU * rng.f32())).collect())
            .collect();
        let mut rebuilt: Frames = magnitudes
            .iter()
            .map(|frame| vec![Complex32::default(); frame.len()])
            .collect();
        let carry = self.momentum / (1.0 + self.momentum);

        for _ in 0..iterations {
            let inverse = self.istft(t, &with_magnitudes(magnitudes, &angles), None);
            let previous = std::mem::replace(&mut rebuilt, self.stft(t, &inverse));

            for ((angle_frame, new_frame), old_frame) in angles.iter_mut().zip(&rebuilt).zip(&previous) {
                for ((angle, new), old) in angle_frame.iter_mut().zip(new_frame).zip(old_frame) {
                    let estimate = *new - *old * carry;
                    *angle = estimate / (estimate.norm() + f32::MIN_POSITIVE);
                }
            }
        }

        self.istft(t, &with_magnitudes(magnitudes, &angles), None)
    }
}

fn with_magnitudes(magnitudes: &[Vec<f32>], angles: &Frames) -> Frames {
    magnitudes
        .iter()
        .zip(angles)
        .map(|(mags, phases)| mags.iter().zip(phases).map(|(m, p)| *p * *m).collect())
        .collect()
}

/// Band-limited resample by `ratio` (output rate / input rate)
fn resample(samples: &[f32], ratio: f64) -> Result<Signal> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: RESAMPLE_SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Trailing zeros flush the filter's latency out of the resampler
    let mut padded = samples.to_vec();
    padded.resize(samples.len() + RESAMPLE_SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded.len(), 1)
        .map_err(|e| FxError::Spectral(format!("Resample init error: {}", e)))?;

    let input = vec![padded];
    let output = resampler
        .process(&input, None)
        .map_err(|e| FxError::Spectral(format!("Resample error: {}", e)))?;

    let latency = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    Ok(output.into_iter().flatten().skip(latency).take(expected).collect())
}

impl SpectralProcessor for StftProcessor {
    fn pitch_shift(&self, input: &[f32], sample_rate: u32, semitones: f32) -> Result<Signal> {
        if input.is_empty() {
            return Err(FxError::InvalidBufferLength);
        }
        // Stretch by the pitch ratio, then resample back to the original duration
        let rate = 2f32.powf(-semitones / 12.0);
        debug!(semitones, rate, sample_rate, samples = input.len(), "pitch shift");

        let stretched = self.time_stretch(input, rate)?;
        let shifted = resample(&stretched, rate as f64)?;
        Ok(fit_length(shifted, input.len()))
    }

    fn magnitude_spectrogram(&self, input: &[f32]) -> Result<Spectrogram> {
        if input.is_empty() {
            return Err(FxError::InvalidBufferLength);
        }
        let t = self.transforms();
        let frames = self
            .stft(&t, input)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect();
        Ok(Spectrogram { frames, n_fft: self.n_fft, hop: self.hop })
    }

    fn reconstruct(&self, spectrogram: &Spectrogram, iterations: usize) -> Result<Signal> {
        if spectrogram.n_fft != self.n_fft || spectrogram.hop != self.hop {
            return Err(FxError::Spectral(format!(
                "spectrogram framing {}/{} does not match processor {}/{}",
                spectrogram.n_fft, spectrogram.hop, self.n_fft, self.hop
            )));
        }
        if spectrogram.frames.is_empty() {
            return Err(FxError::InvalidBufferLength);
        }
        let bins = self.num_bins();
        if let Some(bad) = spectrogram.frames.iter().find(|f| f.len() != bins) {
            return Err(FxError::Spectral(format!("frame has {} bins, expected {}", bad.len(), bins)));
        }

        debug!(frames = spectrogram.num_frames(), iterations, "griffin-lim");
        let t = self.transforms();
        Ok(self.griffin_lim(&t, &spectrogram.frames, iterations))
    }

    fn time_stretch(&self, input: &[f32], rate: f32) -> Result<Signal> {
        if input.is_empty() {
            return Err(FxError::InvalidBufferLength);
        }
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(FxError::Spectral(format!("time-stretch rate must be positive, got {rate}")));
        }

        let t = self.transforms();
        let frames = self.stft(&t, input);
        let stretched = self.phase_vocoder(&frames, rate as f64);
        let length = (input.len() as f64 / rate as f64).round() as usize;
        debug!(rate, from = input.len(), to = length, "time stretch");
        Ok(self.istft(&t, &stretched, Some(length)))
    }
}
