use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use sf_core::config::{load_config, SeparatorConfig};
use sf_core::params::SeparationParams;

/// Surveille le fichier config et pousse la section `[params]` dans le moteur.
///
/// Engine-section edits (frame size, layout, backend) would need a new
/// `prepare` and are only logged. A file that fails to parse keeps the
/// previous values. Retourne le Watcher (doit rester vivant pendant la lecture).
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
pub fn spawn_param_watcher(
    config_path: &Path,
    params: &Arc<SeparationParams>,
    active: &SeparatorConfig,
) -> Result<impl Watcher + use<>> {
    let params = Arc::clone(params);
    let active = active.clone();
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
        {
            match load_config(&path) {
                Ok(new_config) => apply_reload(&params, &active, &new_config),
                Err(e) => {
                    log::warn!("Erreur de rechargement config : {e:#}");
                }
            }
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Store the reloaded parameters; report engine fields that cannot change live.
fn apply_reload(params: &SeparationParams, active: &SeparatorConfig, new: &SeparatorConfig) {
    params.apply(new.param_snapshot());
    log::info!(
        "Paramètres rechargés : bass {:.0} Hz, vocals {:.2}, drums {:.2}",
        new.bass_cutoff_hz,
        new.vocals_focus,
        new.drum_sensitivity
    );
    if new.fft_size != active.fft_size
        || new.layout != active.layout
        || new.backend != active.backend
        || new.mono_center_stems != active.mono_center_stems
    {
        log::warn!("Section [engine] modifiée : ignorée jusqu'au prochain lancement");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::stem::StemLayout;

    #[test]
    fn reload_moves_params_only() {
        let active = SeparatorConfig::default();
        let params = active.params();
        let new = SeparatorConfig {
            layout: StemLayout::Six,
            bass_cutoff_hz: 300.0,
            vocals_focus: 0.8,
            ..SeparatorConfig::default()
        };
        apply_reload(&params, &active, &new);
        assert_eq!(params.bass_cutoff_hz(), 300.0);
        assert_eq!(params.vocals_focus(), 0.8);
        assert_eq!(params.drum_sensitivity(), active.drum_sensitivity);
    }

    #[test]
    fn watcher_starts_on_an_existing_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("live.toml");
        std::fs::write(&path, "[params]\nvocals_focus = 0.2\n")?;
        let config = SeparatorConfig::default();
        let params = Arc::new(config.params());
        let _watcher = spawn_param_watcher(&path, &params, &config)?;
        let absent = dir.path().join("absent.toml");
        assert!(spawn_param_watcher(&absent, &params, &config).is_err());
        Ok(())
    }
}
