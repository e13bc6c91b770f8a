use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Write planar stereo samples as a 32-bit float WAV file.
///
/// The shorter channel bounds the frame count.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
///
/// # Example
/// ```no_run
/// use sf_audio::wav::write_stereo;
/// write_stereo("vocals.wav", &[0.0; 64], &[0.0; 64], 44_100).unwrap();
/// ```
pub fn write_stereo(
    path: impl AsRef<Path>,
    left: &[f32],
    right: &[f32],
    sample_rate: u32,
) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Impossible de créer {}", path.display()))?;
    for (&l, &r) in left.iter().zip(right) {
        writer.write_sample(l)?;
        writer.write_sample(r)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Échec de finalisation de {}", path.display()))?;
    Ok(())
}

/// Output path for one stem: `<out_dir>/<input file stem>_<stem>.wav`.
///
/// # Example
/// ```
/// use std::path::Path;
/// use sf_audio::wav::stem_path;
/// let p = stem_path(Path::new("/music/Song One.flac"), Path::new("/out"), "vocals");
/// assert_eq!(p, Path::new("/out/Song One_vocals.wav"));
/// ```
#[must_use]
pub fn stem_path(input: &Path, out_dir: &Path, stem_name: &str) -> PathBuf {
    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track");
    out_dir.join(format!("{base}_{stem_name}.wav"))
}
