use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sf_audio::decode::StereoTrack;
use sf_audio::wav::{stem_path, write_stereo};
use sf_core::config::SeparatorConfig;
use sf_core::stem::{Stem, StemLayout};
use sf_core::traits::StemSeparator;

use crate::engine::StemEngine;
use crate::error::StemsError;

/// Block size used for whole-file separation.
pub const OFFLINE_BLOCK_SIZE: usize = 1024;

/// One separated stem, full length, stereo.
#[derive(Clone, Debug)]
pub struct StemTrack {
    pub stem: Stem,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

/// Every stem of a separated signal, aligned sample-for-sample with the input.
#[derive(Clone, Debug)]
pub struct StemTracks {
    pub layout: StemLayout,
    pub tracks: Vec<StemTrack>,
}

impl StemTracks {
    /// Frames per stem.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.first().map_or(0, |t| t.left.len())
    }

    /// `true` when the stems hold no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Track of `stem`, if the layout has it.
    #[must_use]
    pub fn get(&self, stem: Stem) -> Option<&StemTrack> {
        self.tracks.iter().find(|t| t.stem == stem)
    }

    /// Write every stem as `<out_dir>/<input stem>_<stem>.wav`.
    ///
    /// # Errors
    /// Returns an error if the directory or any file cannot be written.
    pub fn write_all(
        &self,
        input: &Path,
        out_dir: &Path,
        sample_rate: u32,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Impossible de créer {}", out_dir.display()))?;
        self.tracks
            .iter()
            .map(|track| {
                let path = stem_path(input, out_dir, track.stem.name());
                write_stereo(&path, &track.left, &track.right, sample_rate)?;
                log::debug!("Wrote {}", path.display());
                Ok(path)
            })
            .collect()
    }
}

/// Stream a whole stereo signal through a prepared engine.
///
/// Feeds `block_size` frames at a time, then `latency_samples()` frames of
/// silence to flush the overlap-add tail, and drops the leading latency so
/// each stem has the input's length and timing. The engine is reset first.
///
/// # Errors
/// `NotPrepared`, `EmptyBlock`, `BlockTooLarge`, or `ChannelLength`.
///
/// # Example
/// ```
/// use sf_core::config::{BackendPreference, SeparatorConfig};
/// use sf_core::traits::StemSeparator;
/// use sf_stems::engine::StemEngine;
/// use sf_stems::offline::separate_buffer;
///
/// let config = SeparatorConfig { fft_size: 512, backend: BackendPreference::Cpu, ..Default::default() };
/// let mut engine = StemEngine::new(config);
/// engine.prepare(44_100.0, 256);
/// let signal = vec![0.25f32; 3000];
/// let stems = separate_buffer(&mut engine, &signal, &signal, 256).unwrap();
/// assert_eq!(stems.len(), 3000);
/// ```
pub fn separate_buffer(
    engine: &mut StemEngine,
    left: &[f32],
    right: &[f32],
    block_size: usize,
) -> Result<StemTracks, StemsError> {
    if !engine.is_prepared() {
        return Err(StemsError::NotPrepared);
    }
    if block_size == 0 {
        return Err(StemsError::EmptyBlock);
    }
    if block_size > engine.max_block_size() {
        return Err(StemsError::BlockTooLarge {
            block: block_size,
            max: engine.max_block_size(),
        });
    }
    if left.len() != right.len() {
        return Err(StemsError::ChannelLength {
            left: left.len(),
            right: right.len(),
        });
    }

    engine.reset();
    let latency = engine.latency_samples();
    let total = left.len();
    let layout = engine.config().layout;
    let mut tracks: Vec<StemTrack> = layout
        .stems()
        .iter()
        .map(|&stem| StemTrack {
            stem,
            left: Vec::with_capacity(total),
            right: Vec::with_capacity(total),
        })
        .collect();

    let silence = vec![0.0f32; block_size];
    let mut consumed = 0;
    let padded = total + latency;
    while consumed < padded {
        let n = block_size.min(padded - consumed);
        if consumed >= total {
            engine.process(&[&silence[..n], &silence[..n]]);
        } else if consumed + n <= total {
            engine.process(&[&left[consumed..consumed + n], &right[consumed..consumed + n]]);
        } else {
            // Block straddling the end of the input: tail, then silence.
            let mut l = silence[..n].to_vec();
            let mut r = silence[..n].to_vec();
            let tail = total - consumed;
            l[..tail].copy_from_slice(&left[consumed..]);
            r[..tail].copy_from_slice(&right[consumed..]);
            engine.process(&[&l, &r]);
        }

        // Output position `consumed + i` carries input `consumed + i - latency`.
        let skip = latency.saturating_sub(consumed).min(n);
        let stems = engine.stems();
        for (idx, track) in tracks.iter_mut().enumerate() {
            track.left.extend_from_slice(&stems.channel(idx, 0)[skip..n]);
            track.right.extend_from_slice(&stems.channel(idx, 1)[skip..n]);
        }
        consumed += n;
    }

    for track in &mut tracks {
        track.left.truncate(total);
        track.right.truncate(total);
    }
    Ok(StemTracks { layout, tracks })
}

/// Separate a decoded track with a fresh engine built from `config`.
///
/// # Errors
/// Returns an error if the engine cannot be prepared or separation fails.
pub fn separate_track(config: &SeparatorConfig, track: &StereoTrack) -> Result<StemTracks> {
    let mut engine = StemEngine::new(config.clone());
    engine.prepare(f64::from(track.sample_rate), OFFLINE_BLOCK_SIZE);
    if !engine.is_prepared() {
        anyhow::bail!("Moteur de séparation indisponible");
    }
    log::info!(
        "Separating {:.1}s @ {} Hz on {}",
        track.duration_secs(),
        track.sample_rate,
        engine.gpu_info()
    );
    let stems = separate_buffer(&mut engine, &track.left, &track.right, OFFLINE_BLOCK_SIZE)?;
    if engine.fault_count() > 0 {
        log::warn!("{} transform faults during separation", engine.fault_count());
    }
    Ok(stems)
}
