//! fxchain: render a WAV file through an effect chain
//!
//! Usage: `fxchain <input.wav> <output.wav> <chain.toml>`

use anyhow::{bail, Context};
use fxchain_core::{normalize_peak, FxEngine};
use fxchain_services::{read_wav_mono, write_wav, ChainConfig, StftProcessor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("fxchain=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [input, output, config_path] = args.as_slice() else {
        bail!("usage: fxchain <input.wav> <output.wav> <chain.toml>");
    };

    let config = ChainConfig::load(config_path).with_context(|| format!("failed to load chain config {config_path}"))?;
    // Unknown effects fail here, before the input is even read
    let chain = config.chain()?;

    let (samples, sample_rate) = read_wav_mono(input).with_context(|| format!("failed to read {input}"))?;
    tracing::info!(
        input = %input,
        samples = samples.len(),
        sample_rate,
        steps = chain.len(),
        "rendering chain"
    );

    let engine = FxEngine::new(sample_rate)?.with_spectral(StftProcessor::default());
    let mut rendered = engine.process(&samples, &chain, config.params())?;
    if config.normalize {
        rendered = normalize_peak(&rendered);
    }

    write_wav(output, &rendered, sample_rate).with_context(|| format!("failed to write {output}"))?;
    tracing::info!(output = %output, samples = rendered.len(), "done");
    Ok(())
}
