use std::path::PathBuf;

use clap::Parser;
use sf_core::config::{BackendPreference, SeparatorConfig};
use sf_core::stem::{Stem, StemLayout};

/// stemforge : séparation spectrale de stems en temps réel.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier(s) audio à séparer (WAV, FLAC, MP3, OGG). Répétable.
    #[arg(short, long = "input", value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Dossier de sortie des stems. Défaut : dossier du fichier d'entrée.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Fichier de configuration TOML.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Jeu de stems : four ou six.
    #[arg(long)]
    pub layout: Option<StemLayout>,

    /// Backend FFT : auto, cpu ou gpu.
    #[arg(long)]
    pub backend: Option<BackendPreference>,

    /// Coupure basse en Hz [20, 1000].
    #[arg(long, value_name = "HZ")]
    pub bass_cutoff: Option<f32>,

    /// Focus vocal [0, 1].
    #[arg(long)]
    pub vocals_focus: Option<f32>,

    /// Sensibilité batterie [0, 1].
    #[arg(long)]
    pub drum_sensitivity: Option<f32>,

    /// Lire le mix des stems sur la sortie audio au lieu d'écrire des fichiers.
    #[arg(long, default_value_t = false)]
    pub play: bool,

    /// Stem à isoler pendant la lecture. Répétable.
    #[arg(long, value_name = "STEM")]
    pub solo: Vec<Stem>,

    /// Stem à couper pendant la lecture. Répétable.
    #[arg(long, value_name = "STEM")]
    pub mute: Vec<Stem>,

    /// Afficher le backend FFT retenu puis quitter.
    #[arg(long, default_value_t = false)]
    pub info: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Check that the flags describe one runnable mode.
    ///
    /// # Errors
    /// Returns an error if no input is given outside `--info`, or if `--play`
    /// is combined with several inputs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.info {
            return Ok(());
        }
        if self.inputs.is_empty() {
            anyhow::bail!("Aucun fichier d'entrée. Utilisez --input <FILE> ou --info.");
        }
        if self.play && self.inputs.len() > 1 {
            anyhow::bail!("--play ne lit qu'un seul fichier à la fois.");
        }
        if !self.play && !(self.solo.is_empty() && self.mute.is_empty()) {
            log::warn!("--solo/--mute ne s'appliquent qu'à --play, ignorés.");
        }
        Ok(())
    }

    /// Apply command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut SeparatorConfig) {
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(hz) = self.bass_cutoff {
            config.bass_cutoff_hz = hz;
        }
        if let Some(focus) = self.vocals_focus {
            config.vocals_focus = focus;
        }
        if let Some(sensitivity) = self.drum_sensitivity {
            config.drum_sensitivity = sensitivity;
        }
        config.clamp_all();
    }
}
