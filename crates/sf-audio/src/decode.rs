use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded stereo track: planar left/right and the native sample rate.
#[derive(Clone, Debug, Default)]
pub struct StereoTrack {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl StereoTrack {
    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// `true` when the track holds no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode an audio file into planar stereo f32 samples at its native rate.
///
/// Supports WAV, MP3, FLAC, OGG, AAC via symphonia. Mono sources are
/// duplicated on both channels; channels beyond the second are dropped.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded.
///
/// # Example
/// ```no_run
/// use sf_audio::decode::decode_stereo;
/// let track = decode_stereo("track.wav").unwrap();
/// println!("{} frames @ {} Hz", track.len(), track.sample_rate);
/// ```
pub fn decode_stereo(path: impl AsRef<Path>) -> Result<StereoTrack> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .context("No default audio track found")?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let track_id = track.id;
    let mut out = StereoTrack {
        sample_rate,
        ..StereoTrack::default()
    };
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Audio decode packet error: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Audio decode frame error: {e}");
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        // Reuse SampleBuffer: only reallocate if this packet is bigger than current capacity
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        for chunk in buf.samples().chunks(channels) {
            let l = chunk[0];
            let r = if channels > 1 { chunk[1] } else { l };
            out.left.push(l);
            out.right.push(r);
        }
    }

    log::info!(
        "Decoded {} frames ({} ch) @ {}Hz from {}",
        out.len(),
        channels,
        sample_rate,
        path.display()
    );

    Ok(out)
}
