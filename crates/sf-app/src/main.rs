use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sf_core::config::SeparatorConfig;
use sf_core::traits::StemSeparator;
use sf_stems::{StemEngine, StemMixer};

pub mod cli;
pub mod hotreload;
pub mod playback;
pub mod separate;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Valider le mode
    cli.validate()?;

    // 4. Charger la config puis appliquer les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);

    if cli.info {
        let mut engine = StemEngine::new(config.clone());
        engine.prepare(44_100.0, 512);
        println!("is_using_gpu: {}", engine.is_using_gpu());
        println!("gpu_info: {}", engine.gpu_info());
        println!(
            "layout: {}, fft_size: {}, latence: {} échantillons",
            config.layout.name(),
            config.fft_size,
            engine.latency_samples()
        );
        return Ok(());
    }

    if cli.play {
        let mixer = Arc::new(StemMixer::new());
        for &stem in &cli.solo {
            mixer.set_solo(stem, true);
        }
        for &stem in &cli.mute {
            mixer.set_mute(stem, true);
        }
        let Some(input) = cli.inputs.first() else {
            anyhow::bail!("Aucun fichier à lire");
        };
        return playback::play(input, &config, mixer, Some(cli.config.as_path()));
    }

    let written = separate::run_separation(&cli.inputs, cli.out_dir.as_deref(), &config)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Load `--config`, or fall back to defaults when the file is absent.
fn resolve_config(cli: &cli::Cli) -> Result<SeparatorConfig> {
    if cli.config.exists() {
        sf_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(SeparatorConfig::default())
    }
}
