//! Interface to the spectral-processing collaborator
//!
//! Pitch shifting, time stretching and magnitude-only reconstruction are not
//! implemented in this crate. The engine calls out to a [`SpectralProcessor`]
//! for them; `fxchain-services` provides an STFT-based one.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::Signal;

/// Magnitude-only short-time spectrum
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    /// One magnitude vector (`n_fft / 2 + 1` bins) per frame
    pub frames: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop: usize,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

/// Spectral operations the engine delegates
pub trait SpectralProcessor: Send + Sync {
    /// Shift pitch by `semitones`, keeping duration. Output should match the
    /// input length; the engine pads or truncates if it doesn't.
    fn pitch_shift(&self, input: &[f32], sample_rate: u32, semitones: f32) -> Result<Signal>;

    /// Magnitude spectrogram of `input`
    fn magnitude_spectrogram(&self, input: &[f32]) -> Result<Spectrogram>;

    /// Rebuild a waveform from magnitudes alone, refining phase for
    /// `iterations` rounds. May return fewer samples than were analysed.
    fn reconstruct(&self, spectrogram: &Spectrogram, iterations: usize) -> Result<Signal>;

    /// Change duration by `rate` (2.0 = twice as fast, half as long)
    fn time_stretch(&self, input: &[f32], rate: f32) -> Result<Signal>;
}

/// Pad with trailing zeros or truncate to exactly `len` samples
pub fn fit_length(mut signal: Signal, len: usize) -> Signal {
    signal.resize(len, 0.0);
    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_length() {
        assert_eq!(fit_length(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_length(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert!(fit_length(vec![1.0], 0).is_empty());
    }

    #[test]
    fn test_spectrogram_bins() {
        let spec = Spectrogram { frames: vec![vec![0.0; 1025]; 3], n_fft: 2048, hop: 512 };
        assert_eq!(spec.num_bins(), 1025);
        assert_eq!(spec.num_frames(), 3);
    }
}
