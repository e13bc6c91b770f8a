use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use sf_audio::decode::decode_stereo;
use sf_core::config::SeparatorConfig;
use sf_stems::separate_track;

/// Separate every input in parallel, one engine per file.
///
/// Each file's stems land in `out_dir`, or next to the input when `None`.
/// Failures are logged per file; the run fails if any file failed.
///
/// # Errors
/// Returns an error naming how many inputs could not be separated.
pub fn run_separation(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    config: &SeparatorConfig,
) -> Result<Vec<PathBuf>> {
    let results: Vec<(&PathBuf, Result<Vec<PathBuf>>)> = inputs
        .par_iter()
        .map(|input| (input, separate_file(input, out_dir, config)))
        .collect();

    let mut written = Vec::new();
    let mut failed = 0usize;
    for (input, result) in results {
        match result {
            Ok(paths) => {
                log::info!("{} : {} stems écrits", input.display(), paths.len());
                written.extend(paths);
            }
            Err(e) => {
                log::error!("{} : {e:#}", input.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed}/{} fichier(s) en échec", inputs.len());
    }
    Ok(written)
}

/// Decode, separate, and write the stems of one file.
///
/// # Errors
/// Returns an error if decoding, separation, or writing fails.
pub fn separate_file(
    input: &Path,
    out_dir: Option<&Path>,
    config: &SeparatorConfig,
) -> Result<Vec<PathBuf>> {
    let track = decode_stereo(input)?;
    if track.is_empty() {
        anyhow::bail!("Fichier audio vide : {}", input.display());
    }
    let stems = separate_track(config, &track)
        .with_context(|| format!("Séparation impossible : {}", input.display()))?;
    let dir = output_dir(input, out_dir);
    stems.write_all(input, &dir, track.sample_rate)
}

/// `out_dir` if given, otherwise the input's parent directory.
fn output_dir(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    out_dir.map_or_else(
        || {
            input
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        },
        Path::to_path_buf,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_audio::wav::write_stereo;
    use sf_core::config::BackendPreference;
    use sf_core::stem::StemLayout;

    fn cpu_config() -> SeparatorConfig {
        SeparatorConfig {
            fft_size: 512,
            layout: StemLayout::Six,
            backend: BackendPreference::Cpu,
            ..SeparatorConfig::default()
        }
    }

    #[test]
    fn stems_default_to_the_input_directory() {
        assert_eq!(
            output_dir(Path::new("/music/a.wav"), None),
            PathBuf::from("/music")
        );
        assert_eq!(
            output_dir(Path::new("/music/a.wav"), Some(Path::new("/out"))),
            PathBuf::from("/out")
        );
    }

    #[test]
    fn separates_several_files_in_parallel() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut inputs = Vec::new();
        for name in ["one", "two"] {
            let path = dir.path().join(format!("{name}.wav"));
            let left: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
            write_stereo(&path, &left, &left, 22_050)?;
            inputs.push(path);
        }
        let out = dir.path().join("stems");
        let written = run_separation(&inputs, Some(&out), &cpu_config())?;
        assert_eq!(written.len(), 12);
        assert!(out.join("two_piano.wav").exists());

        let back = decode_stereo(out.join("one_vocals.wav"))?;
        assert_eq!(back.len(), 4000);
        assert_eq!(back.sample_rate, 22_050);
        Ok(())
    }

    #[test]
    fn missing_input_fails_the_run() {
        let inputs = vec![PathBuf::from("/definitely/not/here.wav")];
        assert!(run_separation(&inputs, None, &cpu_config()).is_err());
    }
}
