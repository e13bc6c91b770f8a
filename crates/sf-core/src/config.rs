use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::params::{
    BASS_CUTOFF_RANGE, DEFAULT_BASS_CUTOFF_HZ, DEFAULT_DRUM_SENSITIVITY, DEFAULT_VOCALS_FOCUS,
    ParamSnapshot, SeparationParams,
};
use crate::stem::StemLayout;

/// Smallest accepted analysis frame.
pub const MIN_FFT_SIZE: usize = 256;
/// Largest accepted analysis frame.
pub const MAX_FFT_SIZE: usize = 16384;
/// Default analysis frame (2048 samples, ~46 ms at 44.1 kHz).
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Which FFT backend the engine should try at `prepare` time.
///
/// # Example
/// ```
/// use sf_core::config::BackendPreference;
/// assert!(matches!(BackendPreference::default(), BackendPreference::Auto));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Probe the GPU, fall back to CPU.
    #[default]
    Auto,
    /// Never probe; always realfft.
    Cpu,
    /// Probe the GPU and warn loudly on fallback.
    Gpu,
}

impl std::str::FromStr for BackendPreference {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(crate::error::CoreError::Config(format!(
                "backend inconnu '{other}'"
            ))),
        }
    }
}

/// Configuration complète du séparateur.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use sf_core::config::SeparatorConfig;
/// let config = SeparatorConfig::default();
/// assert_eq!(config.fft_size, 2048);
/// assert_eq!(config.hop_size(), 512);
/// assert_eq!(config.num_bins(), 1025);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SeparatorConfig {
    // === Engine ===
    /// Taille de trame FFT (puissance de deux).
    pub fft_size: usize,
    /// Jeu de stems produit.
    pub layout: StemLayout,
    /// Backend FFT souhaité.
    pub backend: BackendPreference,
    /// Basse et voix synthétisées depuis le spectre Mid (mono) au lieu de L/R.
    pub mono_center_stems: bool,

    // === Paramètres ===
    /// Coupure basse en Hz [20, 1000].
    pub bass_cutoff_hz: f32,
    /// Focus vocal [0, 1].
    pub vocals_focus: f32,
    /// Sensibilité batterie [0, 1].
    pub drum_sensitivity: f32,
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            layout: StemLayout::Four,
            backend: BackendPreference::Auto,
            mono_center_stems: false,
            bass_cutoff_hz: DEFAULT_BASS_CUTOFF_HZ,
            vocals_focus: DEFAULT_VOCALS_FOCUS,
            drum_sensitivity: DEFAULT_DRUM_SENSITIVITY,
        }
    }
}

impl SeparatorConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.fft_size = self
            .fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two()
            .min(MAX_FFT_SIZE);
        self.bass_cutoff_hz = sanitize(
            self.bass_cutoff_hz,
            DEFAULT_BASS_CUTOFF_HZ,
            BASS_CUTOFF_RANGE.0,
            BASS_CUTOFF_RANGE.1,
        );
        self.vocals_focus = sanitize(self.vocals_focus, DEFAULT_VOCALS_FOCUS, 0.0, 1.0);
        self.drum_sensitivity =
            sanitize(self.drum_sensitivity, DEFAULT_DRUM_SENSITIVITY, 0.0, 1.0);
    }

    /// Hop between analysis frames: a quarter frame (75 % overlap).
    #[must_use]
    pub fn hop_size(&self) -> usize {
        self.fft_size / 4
    }

    /// Number of spectrum bins, `fft_size / 2 + 1`.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Parameter values as a plain snapshot.
    #[must_use]
    pub fn param_snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            bass_cutoff_hz: self.bass_cutoff_hz,
            vocals_focus: self.vocals_focus,
            drum_sensitivity: self.drum_sensitivity,
        }
    }

    /// Fresh atomic parameter block initialised from this config.
    #[must_use]
    pub fn params(&self) -> SeparationParams {
        SeparationParams::new(self.bass_cutoff_hz, self.vocals_focus, self.drum_sensitivity)
    }
}

fn sanitize(value: f32, default: f32, lo: f32, hi: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        default
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    engine: Option<EngineSection>,
    params: Option<ParamsSection>,
}

/// Engine section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct EngineSection {
    fft_size: Option<usize>,
    layout: Option<StemLayout>,
    backend: Option<BackendPreference>,
    mono_center_stems: Option<bool>,
}

/// Params section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct ParamsSection {
    bass_cutoff_hz: Option<f32>,
    vocals_focus: Option<f32>,
    drum_sensitivity: Option<f32>,
}

/// Parse une config TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this schema.
///
/// # Example
/// ```
/// use sf_core::config::parse_config;
/// let config = parse_config("[params]\nvocals_focus = 0.9\n").unwrap();
/// assert_eq!(config.vocals_focus, 0.9);
/// assert_eq!(config.fft_size, 2048);
/// ```
pub fn parse_config(content: &str) -> Result<SeparatorConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = SeparatorConfig::default();

    if let Some(e) = file.engine {
        if let Some(v) = e.fft_size {
            config.fft_size = v;
        }
        if let Some(v) = e.layout {
            config.layout = v;
        }
        if let Some(v) = e.backend {
            config.backend = v;
        }
        if let Some(v) = e.mono_center_stems {
            config.mono_center_stems = v;
        }
    }

    if let Some(p) = file.params {
        if let Some(v) = p.bass_cutoff_hz {
            config.bass_cutoff_hz = v;
        }
        if let Some(v) = p.vocals_focus {
            config.vocals_focus = v;
        }
        if let Some(v) = p.drum_sensitivity {
            config.drum_sensitivity = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use sf_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<SeparatorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Config invalide dans {}", path.display()))
}
