//! WAV file I/O for mono signals

use std::io::Read;
use std::path::Path;

use fxchain_core::Signal;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::Result;

/// Average interleaved frames down to one channel
pub fn to_mono(samples: &[f32], channels: usize) -> Signal {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Decode a WAV stream to mono `f32` samples and its sample rate.
///
/// Integer samples are scaled into `[-1, 1)` by their bit depth.
pub fn decode_mono<R: Read>(source: R) -> Result<(Signal, u32)> {
    let mut reader = WavReader::new(source)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    debug!(
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        frames = samples.len() / spec.channels.max(1) as usize,
        "decoded wav"
    );
    Ok((to_mono(&samples, spec.channels as usize), spec.sample_rate))
}

pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<(Signal, u32)> {
    let file = std::fs::File::open(path.as_ref())?;
    decode_mono(std::io::BufReader::new(file))
}

/// Write `samples` as a 32-bit float mono WAV
pub fn write_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_float_round_trip() {
        let dir = TempDir::new("fxchain").unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Signal = (0..500).map(|n| (n as f32 * 0.05).sin() * 0.8).collect();

        write_wav(&path, &samples, 22050).unwrap();
        let (read, sample_rate) = read_wav_mono(&path).unwrap();

        assert_eq!(sample_rate, 22050);
        assert_eq!(read, samples);
    }

    #[test]
    fn test_int_stereo_downmix() {
        let dir = TempDir::new("fxchain").unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(16384_i16, 0_i16), (-32768, -16384), (8192, 8192)] {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, sample_rate) = read_wav_mono(&path).unwrap();
        assert_eq!(sample_rate, 8000);
        assert_eq!(mono, vec![0.25, -0.75, 0.25]);
    }

    #[test]
    fn test_to_mono_passthrough() {
        assert_eq!(to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert_eq!(to_mono(&[0.25, 0.75, 1.0, 0.0], 2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_mono(&b"not a wav file"[..]).is_err());
        assert!(read_wav_mono("/nonexistent/fxchain.wav").is_err());
    }
}
