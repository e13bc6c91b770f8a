use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use sf_audio::decode::{decode_stereo, StereoTrack};
use sf_core::config::SeparatorConfig;
use sf_core::stem::Stem;
use sf_core::traits::StemSeparator;
use sf_stems::{StemEngine, StemMixer};
use triple_buffer::TripleBuffer;

use crate::hotreload::spawn_param_watcher;

/// Largest block handed to the engine from one output callback chunk.
pub const PLAYBACK_BLOCK: usize = 1024;

/// Peak level per stem, indexed like [`Stem::ALL`].
pub type Levels = [f32; Stem::ALL.len()];

const METER_INTERVAL: Duration = Duration::from_millis(500);

/// Everything the output callback owns: the track, the engine, the mixer
/// and pre-allocated scratch. [`PlaybackCore::render`] never allocates.
pub struct PlaybackCore {
    track: StereoTrack,
    engine: StemEngine,
    mixer: Arc<StemMixer>,
    position: usize,
    scratch: [Vec<f32>; 4],
}

impl PlaybackCore {
    /// Prepare `engine` for `track` and the fixed playback block size.
    pub fn new(track: StereoTrack, mut engine: StemEngine, mixer: Arc<StemMixer>) -> Self {
        engine.prepare(f64::from(track.sample_rate), PLAYBACK_BLOCK);
        Self {
            track,
            engine,
            mixer,
            position: 0,
            scratch: std::array::from_fn(|_| vec![0.0; PLAYBACK_BLOCK]),
        }
    }

    /// Engine in use (for backend info and fault counts).
    #[must_use]
    pub fn engine(&self) -> &StemEngine {
        &self.engine
    }

    /// `true` once the track and the engine's latency tail have been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.position >= self.track.len() + self.engine.latency_samples()
    }

    /// Fill an interleaved output buffer of `channels` channels.
    ///
    /// Mono devices get `(L + R) / 2`; channels past the second are silent.
    /// Returns `true` when playback has reached the end.
    pub fn render(&mut self, data: &mut [f32], channels: usize) -> bool {
        let channels = channels.max(1);
        for chunk in data.chunks_mut(PLAYBACK_BLOCK * channels) {
            let frames = chunk.len() / channels;
            let [in_l, in_r, out_l, out_r] = &mut self.scratch;
            let inputs = in_l[..frames].iter_mut().zip(in_r[..frames].iter_mut());
            for (i, (l, r)) in inputs.enumerate() {
                let pos = self.position + i;
                *l = self.track.left.get(pos).copied().unwrap_or(0.0);
                *r = self.track.right.get(pos).copied().unwrap_or(0.0);
            }
            self.position += frames;

            self.engine.process(&[&in_l[..frames], &in_r[..frames]]);
            self.mixer
                .mix_into(self.engine.stems(), &mut out_l[..frames], &mut out_r[..frames]);

            for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                if channels == 1 {
                    frame[0] = 0.5 * (out_l[i] + out_r[i]);
                    continue;
                }
                frame[0] = out_l[i];
                frame[1] = out_r[i];
                frame[2..].fill(0.0);
            }
        }
        self.is_finished()
    }
}

/// Play the stem mix-down of `input` on the default output device.
///
/// Blocks until the track has played out. Per-stem levels are logged
/// every half second; `[params]` edits in `config_path` apply live.
///
/// # Errors
/// Returns an error if decoding fails or no output stream can be opened.
pub fn play(
    input: &Path,
    config: &SeparatorConfig,
    mixer: Arc<StemMixer>,
    config_path: Option<&Path>,
) -> Result<()> {
    let track = decode_stereo(input)?;
    if track.is_empty() {
        anyhow::bail!("Fichier audio vide : {}", input.display());
    }
    let duration = track.duration_secs();
    let sample_rate = track.sample_rate;

    let engine = StemEngine::new(config.clone());
    let params = engine.params();
    let mut core = PlaybackCore::new(track, engine, Arc::clone(&mixer));
    log::info!("Playback engine: {}", core.engine().gpu_info());

    let _watcher = match config_path {
        Some(path) if path.exists() => match spawn_param_watcher(path, &params, config) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Hot-reload indisponible : {e}");
                None
            }
        },
        _ => None,
    };

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("Aucun périphérique de sortie audio"))?;
    let stream_config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = usize::from(stream_config.channels);

    let (mut levels_in, mut levels_out) = TripleBuffer::new(&Levels::default()).split();
    let (done_tx, done_rx) = flume::bounded::<()>(1);
    let meter = Arc::clone(&mixer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if core.render(data, channels) {
                    let _ = done_tx.try_send(());
                }
                levels_in.write(meter.levels());
            },
            |err| {
                log::error!("Audio output error: {err}");
            },
            None,
        )
        .context("Impossible d'ouvrir le flux de sortie")?;
    stream.play()?;
    log::info!("Lecture de {} ({duration:.1}s @ {sample_rate} Hz)", input.display());

    loop {
        match done_rx.recv_timeout(METER_INTERVAL) {
            Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
            Err(flume::RecvTimeoutError::Timeout) => {
                log::info!("{}", format_levels(levels_out.read()));
            }
        }
    }
    drop(stream);
    Ok(())
}

/// `vocals -12.0 dB | drums -inf dB | ...` for the stems of the active layout.
fn format_levels(levels: &Levels) -> String {
    Stem::ALL
        .iter()
        .zip(levels)
        .filter(|(_, level)| **level > 0.0)
        .map(|(stem, level)| format!("{stem} {:.1} dB", 20.0 * level.log10()))
        .collect::<Vec<_>>()
        .join(" | ")
}
