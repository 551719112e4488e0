//! Effect registry and chain compositor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::delay::{chorus, flanger};
use crate::distortion::distortion;
use crate::error::{FxError, Result};
use crate::params::{
    ChorusParams, DistortionParams, EffectParams, FlangerParams, GriffinParams, PitchParams,
    TremoloParams, WahwahParams,
};
use crate::spectral::{fit_length, SpectralProcessor};
use crate::tremolo::tremolo;
use crate::wahwah::wahwah;
use crate::Signal;

/// Every effect the engine knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Flanger,
    Distortion,
    Wahwah,
    Tremolo,
    Chorus,
    Pitch,
    Griffin,
    TimeStretch,
}

impl EffectKind {
    pub const ALL: [EffectKind; 8] = [
        Self::Flanger,
        Self::Distortion,
        Self::Wahwah,
        Self::Tremolo,
        Self::Chorus,
        Self::Pitch,
        Self::Griffin,
        Self::TimeStretch,
    ];

    /// Identifier used in chain specs and as the parameter key prefix
    pub fn id(self) -> &'static str {
        match self {
            Self::Flanger => "flanger",
            Self::Distortion => "distortion",
            Self::Wahwah => "wahwah",
            Self::Tremolo => "tremolo",
            Self::Chorus => "chorus",
            Self::Pitch => "pitch",
            Self::Griffin => "griffin",
            Self::TimeStretch => "timestretch",
        }
    }

    /// Routed to the [`SpectralProcessor`]
    pub fn is_spectral(self) -> bool {
        matches!(self, Self::Pitch | Self::Griffin | Self::TimeStretch)
    }

    /// Output replaces the running signal instead of being blended; the mix
    /// factor is passed to the effect as its rate
    pub fn is_replace(self) -> bool {
        matches!(self, Self::TimeStretch)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EffectKind {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| FxError::UnknownEffect(s.to_string()))
    }
}

/// One step of a chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub effect: EffectKind,
    /// 0.0 = dry (skipped), 1.0 = fully wet
    pub mix: f32,
}

/// Ordered list of effects to apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectChain {
    entries: Vec<ChainEntry>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from `(identifier, mix)` pairs. Any unknown identifier
    /// rejects the whole chain.
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, mix)| {
                let effect = name.as_ref().parse()?;
                Ok(ChainEntry { effect, mix })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Builder-style append
    pub fn with(mut self, effect: EffectKind, mix: f32) -> Self {
        self.push(effect, mix);
        self
    }

    pub fn push(&mut self, effect: EffectKind, mix: f32) {
        self.entries.push(ChainEntry { effect, mix });
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An effect with its parameters resolved
#[derive(Debug, Clone, Copy)]
enum EffectConfig {
    Flanger(FlangerParams),
    Distortion(DistortionParams),
    Wahwah(WahwahParams),
    Tremolo(TremoloParams),
    Chorus(ChorusParams),
    Pitch(PitchParams),
    Griffin(GriffinParams),
    TimeStretch,
}

impl EffectConfig {
    fn resolve(kind: EffectKind, params: &EffectParams) -> Result<Self> {
        Ok(match kind {
            EffectKind::Flanger => Self::Flanger(FlangerParams::resolve(params)?),
            EffectKind::Distortion => Self::Distortion(DistortionParams::resolve(params)?),
            EffectKind::Wahwah => Self::Wahwah(WahwahParams::resolve(params)?),
            EffectKind::Tremolo => Self::Tremolo(TremoloParams::resolve(params)?),
            EffectKind::Chorus => Self::Chorus(ChorusParams::resolve(params)?),
            EffectKind::Pitch => Self::Pitch(PitchParams::resolve(params)?),
            EffectKind::Griffin => Self::Griffin(GriffinParams::resolve(params)?),
            EffectKind::TimeStretch => Self::TimeStretch,
        })
    }
}

/// Runs effect chains at a fixed sample rate.
///
/// Holds no state between calls apart from the sample rate and the optional
/// spectral backend, so one engine can serve any number of buffers.
pub struct FxEngine {
    sample_rate: u32,
    spectral: Option<Box<dyn SpectralProcessor>>,
}

impl fmt::Debug for FxEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FxEngine")
            .field("sample_rate", &self.sample_rate)
            .field("spectral", &self.spectral.is_some())
            .finish()
    }
}

impl FxEngine {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FxError::InvalidSampleRate(sample_rate));
        }
        Ok(Self { sample_rate, spectral: None })
    }

    /// Attach the backend for `pitch`, `griffin` and `timestretch`
    pub fn with_spectral(mut self, processor: impl SpectralProcessor + 'static) -> Self {
        self.spectral = Some(Box::new(processor));
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn has_spectral(&self) -> bool {
        self.spectral.is_some()
    }

    /// Run one effect fully wet. `timestretch` runs at rate 1.0.
    pub fn apply(&self, effect: EffectKind, input: &[f32], params: &EffectParams) -> Result<Signal> {
        let config = self.prepare_entry(effect, params)?;
        self.render(effect, &config, input, 1.0)
    }

    /// Run `chain` over `input`.
    ///
    /// The whole chain is validated first (parameter types, spectral backend)
    /// so a bad entry never leaves a half-processed result. Entries with a
    /// mix of zero or below are skipped without being invoked.
    pub fn process(&self, input: &[f32], chain: &EffectChain, params: &EffectParams) -> Result<Signal> {
        let stages = chain
            .entries()
            .iter()
            .map(|entry| {
                if !(entry.mix > 0.0) {
                    return Ok(None);
                }
                self.prepare_entry(entry.effect, params).map(Some)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut signal = input.to_vec();
        for (entry, config) in chain.entries().iter().zip(stages) {
            let Some(config) = config else {
                debug!(effect = %entry.effect, mix = entry.mix, "skipping dry effect");
                continue;
            };

            if entry.effect.is_replace() {
                signal = self.render(entry.effect, &config, &signal, entry.mix)?;
                debug!(effect = %entry.effect, rate = entry.mix, samples = signal.len(), "replaced signal");
                continue;
            }

            let wet = self.render(entry.effect, &config, &signal, 1.0)?;
            let mix = entry.mix;
            for (dry, wet) in signal.iter_mut().zip(&wet) {
                *dry = (1.0 - mix) * *dry + mix * wet;
            }
            debug!(effect = %entry.effect, mix, "applied effect");
        }

        Ok(signal)
    }

    /// Parse `(identifier, mix)` pairs and run them
    pub fn process_named<S: AsRef<str>>(
        &self,
        input: &[f32],
        chain: &[(S, f32)],
        params: &EffectParams,
    ) -> Result<Signal> {
        let chain = EffectChain::parse(chain.iter().map(|(name, mix)| (name.as_ref(), *mix)))?;
        self.process(input, &chain, params)
    }

    fn prepare_entry(&self, effect: EffectKind, params: &EffectParams) -> Result<EffectConfig> {
        if effect.is_spectral() && self.spectral.is_none() {
            return Err(FxError::SpectralUnavailable(effect));
        }
        EffectConfig::resolve(effect, params)
    }

    fn spectral(&self, effect: EffectKind) -> Result<&dyn SpectralProcessor> {
        self.spectral.as_deref().ok_or(FxError::SpectralUnavailable(effect))
    }

    fn render(&self, effect: EffectKind, config: &EffectConfig, input: &[f32], rate: f32) -> Result<Signal> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let sr = self.sample_rate;
        let len = input.len();
        let out = match config {
            EffectConfig::Flanger(p) => flanger(input, sr, p),
            EffectConfig::Distortion(p) => distortion(input, p.alpha),
            EffectConfig::Wahwah(p) => wahwah(input, sr, p),
            EffectConfig::Tremolo(p) => tremolo(input, sr, p),
            EffectConfig::Chorus(p) => chorus(input, sr, p),
            EffectConfig::Pitch(p) => {
                let spectral = self.spectral(effect)?;
                let up = fit_length(spectral.pitch_shift(input, sr, p.semitones)?, len);
                if p.mirror {
                    let down = fit_length(spectral.pitch_shift(input, sr, -p.semitones)?, len);
                    up.iter().zip(&down).map(|(a, b)| (a + b) / 2.0).collect()
                } else {
                    up
                }
            }
            EffectConfig::Griffin(p) => {
                let spectral = self.spectral(effect)?;
                let magnitudes = spectral.magnitude_spectrogram(input)?;
                fit_length(spectral.reconstruct(&magnitudes, p.iterations)?, len)
            }
            EffectConfig::TimeStretch => self.spectral(effect)?.time_stretch(input, rate)?,
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::spectral::Spectrogram;

    /// Cheap stand-in that records how often it is called
    #[derive(Default, Clone)]
    struct FakeSpectral {
        calls: Arc<AtomicUsize>,
    }

    impl FakeSpectral {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl SpectralProcessor for FakeSpectral {
        fn pitch_shift(&self, input: &[f32], _sample_rate: u32, semitones: f32) -> Result<Signal> {
            self.hit();
            // One sample too long, to exercise truncation
            let mut out: Signal = input.iter().map(|x| x + semitones).collect();
            out.push(99.0);
            Ok(out)
        }

        fn magnitude_spectrogram(&self, input: &[f32]) -> Result<Spectrogram> {
            self.hit();
            Ok(Spectrogram { frames: vec![input.iter().map(|x| x.abs()).collect()], n_fft: 2, hop: 1 })
        }

        fn reconstruct(&self, spectrogram: &Spectrogram, iterations: usize) -> Result<Signal> {
            self.hit();
            let frame = &spectrogram.frames[0];
            Ok(frame[..frame.len() / 2].iter().map(|m| m * (iterations + 1) as f32).collect())
        }

        fn time_stretch(&self, input: &[f32], rate: f32) -> Result<Signal> {
            self.hit();
            let len = (input.len() as f32 / rate).round() as usize;
            Ok((0..len).map(|i| input[((i as f32 * rate) as usize).min(input.len() - 1)]).collect())
        }
    }

    fn test_signal() -> Signal {
        (0..512).map(|n| (n as f32 * 0.05).sin() * 0.8).collect()
    }

    fn engine_with_fake() -> (FxEngine, FakeSpectral) {
        let fake = FakeSpectral::default();
        let engine = FxEngine::new(8000).unwrap().with_spectral(fake.clone());
        (engine, fake)
    }

    #[test]
    fn test_effect_ids_round_trip() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.id().parse::<EffectKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.id());
        }
        assert!(matches!("reverb".parse::<EffectKind>(), Err(FxError::UnknownEffect(ref s)) if s == "reverb"));
        assert!(EffectKind::TimeStretch.is_replace());
        assert!(!EffectKind::Pitch.is_replace());
        assert!(EffectKind::Griffin.is_spectral());
        assert!(!EffectKind::Chorus.is_spectral());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FxEngine>();
    }

    #[test]
    fn test_extreme_delay_override_leaves_input() {
        let engine = FxEngine::new(8000).unwrap();
        let input = test_signal();
        let params = EffectParams::new().with("flanger_delay", -1e30).with("chorus_delay", -1e30);
        for kind in [EffectKind::Flanger, EffectKind::Chorus] {
            let chain = EffectChain::new().with(kind, 1.0);
            assert_eq!(engine.process(&input, &chain, &params).unwrap(), input, "{kind}");
        }
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(matches!(FxEngine::new(0), Err(FxError::InvalidSampleRate(0))));
    }

    #[test]
    fn test_all_dry_chain_is_bit_exact() {
        // No spectral backend: dry spectral entries must not even be prepared
        let engine = FxEngine::new(44100).unwrap();
        let input = test_signal();
        let mut chain = EffectChain::new();
        for kind in EffectKind::ALL {
            chain.push(kind, 0.0);
        }
        chain.push(EffectKind::Flanger, -0.5);
        chain.push(EffectKind::Tremolo, f32::NAN);

        let out = engine.process(&input, &chain, &EffectParams::new()).unwrap();
        assert_eq!(out.len(), input.len());
        assert!(out.iter().zip(&input).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_full_mix_equals_direct_call() {
        let engine = FxEngine::new(8000).unwrap();
        let input = test_signal();
        let params = EffectParams::new();

        let cases: [(EffectKind, Signal); 5] = [
            (EffectKind::Flanger, flanger(&input, 8000, &FlangerParams::default())),
            (EffectKind::Chorus, chorus(&input, 8000, &ChorusParams::default())),
            (EffectKind::Wahwah, wahwah(&input, 8000, &WahwahParams::default())),
            (EffectKind::Distortion, distortion(&input, 5.0)),
            (EffectKind::Tremolo, tremolo(&input, 8000, &TremoloParams::default())),
        ];
        for (kind, direct) in cases {
            let chain = EffectChain::new().with(kind, 1.0);
            assert_eq!(engine.process(&input, &chain, &params).unwrap(), direct, "{kind}");
            assert_eq!(engine.apply(kind, &input, &params).unwrap(), direct, "{kind}");
        }
    }

    #[test]
    fn test_half_mix_is_mean_of_dry_and_wet() {
        let engine = FxEngine::new(8000).unwrap();
        let input = test_signal();
        let params = EffectParams::new().with("tremolo_modfreq", 3.0);

        let wet = engine.apply(EffectKind::Tremolo, &input, &params).unwrap();
        let chain = EffectChain::new().with(EffectKind::Tremolo, 0.5);
        let out = engine.process(&input, &chain, &params).unwrap();

        for ((o, d), w) in out.iter().zip(&input).zip(&wet) {
            assert!((o - (d + w) / 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_order_matters() {
        let engine = FxEngine::new(8000).unwrap();
        let input = test_signal();
        let params = EffectParams::new();
        let a = engine
            .process(&input, &EffectChain::new().with(EffectKind::Distortion, 1.0).with(EffectKind::Wahwah, 1.0), &params)
            .unwrap();
        let b = engine
            .process(&input, &EffectChain::new().with(EffectKind::Wahwah, 1.0).with(EffectKind::Distortion, 1.0), &params)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_effect_rejects_before_processing() {
        let (engine, fake) = engine_with_fake();
        let input = test_signal();
        let result = engine.process_named(&input, &[("pitch", 1.0), ("reverb", 0.5)], &EffectParams::new());
        assert!(matches!(result, Err(FxError::UnknownEffect(ref s)) if s == "reverb"));
        assert_eq!(fake.calls(), 0);
    }

    #[test]
    fn test_bad_override_rejects_before_processing() {
        let (engine, fake) = engine_with_fake();
        let chain = EffectChain::new().with(EffectKind::Pitch, 1.0).with(EffectKind::Distortion, 0.5);
        let params = EffectParams::new().with("distortion_alpha", "very");
        let result = engine.process(&test_signal(), &chain, &params);
        assert!(matches!(result, Err(FxError::ParameterOverrideTypeMismatch { .. })));
        assert_eq!(fake.calls(), 0);

        // The same bad key is harmless when its effect is dry
        let chain = EffectChain::new().with(EffectKind::Distortion, 0.0);
        assert!(engine.process(&test_signal(), &chain, &params).is_ok());
    }

    #[test]
    fn test_missing_spectral_backend() {
        let engine = FxEngine::new(8000).unwrap();
        let chain = EffectChain::new().with(EffectKind::Tremolo, 1.0).with(EffectKind::Griffin, 0.5);
        let result = engine.process(&test_signal(), &chain, &EffectParams::new());
        assert!(matches!(result, Err(FxError::SpectralUnavailable(EffectKind::Griffin))));
    }

    #[test]
    fn test_timestretch_replaces_with_mix_as_rate() {
        let (engine, fake) = engine_with_fake();
        let input = test_signal();
        let chain = EffectChain::new().with(EffectKind::TimeStretch, 2.0);
        let out = engine.process(&input, &chain, &EffectParams::new()).unwrap();
        assert_eq!(out.len(), input.len() / 2);
        assert_eq!(out[1], input[2]);
        assert_eq!(fake.calls(), 1);

        // Subsequent blend-type effects run on the new length
        let chain = EffectChain::new().with(EffectKind::TimeStretch, 0.5).with(EffectKind::Tremolo, 0.3);
        assert_eq!(engine.process(&input, &chain, &EffectParams::new()).unwrap().len(), input.len() * 2);
    }

    #[test]
    fn test_pitch_fits_length_and_mirrors() {
        let (engine, fake) = engine_with_fake();
        let input = test_signal();

        let params = EffectParams::new().with("pitch_semitones", 2.0);
        let out = engine.apply(EffectKind::Pitch, &input, &params).unwrap();
        assert_eq!(out.len(), input.len());
        assert_eq!(out[0], input[0] + 2.0);

        let params = params.with("pitch_mirror", true);
        let out = engine.apply(EffectKind::Pitch, &input, &params).unwrap();
        for (o, i) in out.iter().zip(&input) {
            assert!((o - i).abs() < 1e-6);
        }
        assert_eq!(fake.calls(), 3);
    }

    #[test]
    fn test_griffin_pads_to_input_length() {
        let (engine, _) = engine_with_fake();
        let input = vec![0.5, -0.25, 1.0, 0.75];
        let params = EffectParams::new().with("griffin_iters", 1.0);
        let out = engine.apply(EffectKind::Griffin, &input, &params).unwrap();
        assert_eq!(out, vec![1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_input_every_effect() {
        let (engine, fake) = engine_with_fake();
        for kind in EffectKind::ALL {
            assert!(engine.apply(kind, &[], &EffectParams::new()).unwrap().is_empty(), "{kind}");
            let chain = EffectChain::new().with(kind, 1.0);
            assert!(engine.process(&[], &chain, &EffectParams::new()).unwrap().is_empty());
        }
        assert_eq!(fake.calls(), 0);
    }

    #[test]
    fn test_parse_keeps_order_and_duplicates() {
        let chain = EffectChain::parse([("tremolo", 0.2), ("chorus", 1.0), ("tremolo", 0.4)]).unwrap();
        let kinds: Vec<_> = chain.entries().iter().map(|e| e.effect).collect();
        assert_eq!(kinds, vec![EffectKind::Tremolo, EffectKind::Chorus, EffectKind::Tremolo]);
        assert_eq!(chain.entries()[2].mix, 0.4);
    }
}
