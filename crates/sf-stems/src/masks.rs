use sf_core::params::ParamSnapshot;
use sf_core::stem::{Stem, StemLayout};

use crate::analyzer::StereoSpectrum;

/// Guard added to every magnitude denominator.
pub const EPSILON: f32 = 1e-10;

/// Weight kept from the previous smoothed magnitude at each frame.
pub const MAGNITUDE_DECAY: f32 = 0.8;

/// Below this summed raw gain a bin is ambiguous and goes to "other".
/// Silent bins (`|L| + |R| < EPSILON`) go there too.
pub const NEAR_ZERO_TOTAL: f32 = 1e-6;

// Bandes de fréquences (Hz).
const VOCALS_BAND: (f32, f32) = (100.0, 8000.0);
const VOCALS_PRESENCE: (f32, f32) = (300.0, 3500.0);
const VOCALS_PRESENCE_GAIN: f32 = 1.3;
const DRUMS_LOW_BAND: (f32, f32) = (50.0, 400.0);
const DRUMS_HIGH_BAND: (f32, f32) = (4000.0, 12000.0);
const DRUMS_BAND_GAIN: f32 = 1.2;
const GUITAR_BAND: (f32, f32) = (80.0, 5000.0);
const GUITAR_SCALE: f32 = 0.5;
const PIANO_BAND: (f32, f32) = (27.5, 4200.0);
const PIANO_SCALE: f32 = 0.35;

/// Per-bin gain masks, one per stem of the layout, summing to 1 at every bin.
///
/// Heuristics:
/// - bass: passthrough up to the cutoff bin, quadratic rolloff to twice it;
/// - vocals: stereo centeredness `|M| / (|M| + |S|)` in 100–8000 Hz, blended
///   toward 0.5 as the focus drops, boosted in the presence band;
/// - drums: excess of `|L| + |R|` over its smoothed history, scaled by the
///   sensitivity and boosted in the low and high percussive bands;
/// - guitar (six stems): side content in 80–5000 Hz;
/// - piano (six stems): steady, off-center content in 27.5–4200 Hz;
/// - other: `max(0, 1 − sum)` after rescaling sums above 1.
///
/// `prev_magnitude` is the only state carried between frames.
///
/// # Example
/// ```
/// use sf_core::params::ParamSnapshot;
/// use sf_core::stem::{Stem, StemLayout};
/// use sf_stems::analyzer::StereoSpectrum;
/// use sf_stems::masks::MaskComputer;
///
/// let mut masks = MaskComputer::new(StemLayout::Four, 2048, 44_100.0);
/// masks.compute(&StereoSpectrum::new(1025), ParamSnapshot::default());
/// // Silence routes everything to "other".
/// assert!(masks.mask(Stem::Other).unwrap().iter().all(|&g| g == 1.0));
/// ```
pub struct MaskComputer {
    layout: StemLayout,
    fft_size: usize,
    sample_rate: f32,
    num_bins: usize,
    /// `masks[stem][bin]`, stems in layout order.
    masks: Vec<Vec<f32>>,
    prev_magnitude: Vec<f32>,
    /// Bin → fréquence (Hz), précalculé.
    bin_freqs: Vec<f32>,
}

impl MaskComputer {
    /// Pre-allocate masks and history for `fft_size` at `sample_rate`.
    #[must_use]
    pub fn new(layout: StemLayout, fft_size: usize, sample_rate: f32) -> Self {
        let num_bins = fft_size / 2 + 1;
        let bin_hz = sample_rate / fft_size as f32;
        Self {
            layout,
            fft_size,
            sample_rate,
            num_bins,
            masks: vec![vec![0.0; num_bins]; layout.len()],
            prev_magnitude: vec![0.0; num_bins],
            bin_freqs: (0..num_bins).map(|k| k as f32 * bin_hz).collect(),
        }
    }

    /// Layout the masks are computed for.
    #[must_use]
    pub fn layout(&self) -> StemLayout {
        self.layout
    }

    /// Nearest bin of `hz`, clamped to `[1, num_bins - 1]`.
    #[must_use]
    pub fn freq_to_bin(&self, hz: f32) -> usize {
        let bin = (hz * self.fft_size as f32 / self.sample_rate).round();
        (bin.max(1.0) as usize).min(self.num_bins - 1)
    }

    /// Mask at bus `index` (layout order).
    #[must_use]
    pub fn mask_at(&self, index: usize) -> &[f32] {
        &self.masks[index]
    }

    /// Mask of `stem`, or `None` if the layout lacks it.
    #[must_use]
    pub fn mask(&self, stem: Stem) -> Option<&[f32]> {
        self.layout.index_of(stem).map(|i| self.masks[i].as_slice())
    }

    /// Smoothed `|L| + |R|` history used by the transient test.
    #[must_use]
    pub fn prev_magnitude(&self) -> &[f32] {
        &self.prev_magnitude
    }

    /// Zero masks and history.
    pub fn reset(&mut self) {
        for mask in &mut self.masks {
            mask.fill(0.0);
        }
        self.prev_magnitude.fill(0.0);
    }

    /// Compute every mask for one frame and advance the magnitude history.
    pub fn compute(&mut self, spectrum: &StereoSpectrum, params: ParamSnapshot) {
        debug_assert_eq!(spectrum.num_bins(), self.num_bins);

        let cutoff_bin = self.freq_to_bin(params.bass_cutoff_hz) as f32;
        let focus = params.vocals_focus;
        let sensitivity = params.drum_sensitivity;
        let six = self.layout == StemLayout::Six;

        for bin in 0..self.num_bins {
            let freq = self.bin_freqs[bin];
            let mid_mag = spectrum.mid[bin].norm();
            let side_mag = spectrum.side[bin].norm();
            let centeredness = mid_mag / (mid_mag + side_mag + EPSILON);

            let current = spectrum.left[bin].norm() + spectrum.right[bin].norm();
            let previous = self.prev_magnitude[bin];
            self.prev_magnitude[bin] =
                previous * MAGNITUDE_DECAY + current * (1.0 - MAGNITUDE_DECAY);

            // Bus order: vocals, drums, bass, other, guitar, piano.
            let mut raw = [0.0f32; 6];
            raw[0] = vocals_gain(freq, centeredness, focus);
            raw[1] = drums_gain(freq, current, previous, sensitivity);
            raw[2] = bass_gain(bin as f32, cutoff_bin);
            if six {
                raw[4] = guitar_gain(freq, centeredness);
                raw[5] = piano_gain(freq, current, previous, centeredness);
            }

            let total: f32 = raw.iter().sum();
            if total < NEAR_ZERO_TOTAL || current < EPSILON {
                raw = [0.0; 6];
            } else if total > 1.0 {
                let scale = 1.0 / total;
                for g in &mut raw {
                    *g *= scale;
                }
            }
            let used = raw.iter().sum::<f32>();
            raw[3] = (1.0 - used).max(0.0);

            for (mask, &gain) in self.masks.iter_mut().zip(&raw) {
                mask[bin] = gain;
            }
        }
    }
}

/// Passthrough up to `cutoff_bin`, then `(1 − t)²` down to zero at twice the cutoff.
#[inline(always)]
fn bass_gain(bin: f32, cutoff_bin: f32) -> f32 {
    if bin <= cutoff_bin {
        1.0
    } else if bin < cutoff_bin * 2.0 {
        let t = (bin - cutoff_bin) / cutoff_bin;
        (1.0 - t) * (1.0 - t)
    } else {
        0.0
    }
}

#[inline(always)]
fn vocals_gain(freq: f32, centeredness: f32, focus: f32) -> f32 {
    if !in_band(freq, VOCALS_BAND) {
        return 0.0;
    }
    let mut gain = centeredness * focus + (1.0 - focus) * 0.5;
    if in_band(freq, VOCALS_PRESENCE) {
        gain *= VOCALS_PRESENCE_GAIN;
    }
    gain.min(1.0)
}

#[inline(always)]
fn drums_gain(freq: f32, current: f32, previous: f32, sensitivity: f32) -> f32 {
    let excess = (current - previous).max(0.0);
    let mut gain = excess / (current + EPSILON) * sensitivity;
    if in_band(freq, DRUMS_LOW_BAND) || in_band(freq, DRUMS_HIGH_BAND) {
        gain *= DRUMS_BAND_GAIN;
    }
    gain.min(1.0)
}

#[inline(always)]
fn guitar_gain(freq: f32, centeredness: f32) -> f32 {
    if in_band(freq, GUITAR_BAND) {
        (1.0 - centeredness) * GUITAR_SCALE
    } else {
        0.0
    }
}

#[inline(always)]
fn piano_gain(freq: f32, current: f32, previous: f32, centeredness: f32) -> f32 {
    if !in_band(freq, PIANO_BAND) {
        return 0.0;
    }
    let steady = current.min(previous) / (current + EPSILON);
    steady * PIANO_SCALE * (1.0 - centeredness)
}

#[inline(always)]
fn in_band(freq: f32, (lo, hi): (f32, f32)) -> bool {
    freq > lo && freq < hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_audio::Complex32;

    const SIZE: usize = 2048;
    const RATE: f32 = 44_100.0;

    fn spectrum_from(
        left: impl Fn(usize) -> Complex32,
        right: impl Fn(usize) -> Complex32,
    ) -> StereoSpectrum {
        let mut s = StereoSpectrum::new(SIZE / 2 + 1);
        for k in 0..s.num_bins() {
            s.left[k] = left(k);
            s.right[k] = right(k);
            s.mid[k] = (s.left[k] + s.right[k]) * 0.5;
            s.side[k] = (s.left[k] - s.right[k]) * 0.5;
        }
        s
    }

    fn assert_conserves(masks: &MaskComputer) {
        let stems = masks.layout().len();
        for bin in 0..SIZE / 2 + 1 {
            let sum: f32 = (0..stems).map(|i| masks.mask_at(i)[bin]).sum();
            assert!(sum <= 1.0 + 1e-5, "bin {bin}: sum {sum}");
            assert!((sum - 1.0).abs() < 1e-5, "bin {bin}: sum {sum}");
            for i in 0..stems {
                let g = masks.mask_at(i)[bin];
                assert!((0.0..=1.0 + 1e-6).contains(&g));
            }
        }
    }

    #[test]
    fn masks_sum_to_one_everywhere() {
        for layout in [StemLayout::Four, StemLayout::Six] {
            let mut masks = MaskComputer::new(layout, SIZE, RATE);
            let spectra = [
                spectrum_from(
                    |k| Complex32::new(1.0 + k as f32, 0.5),
                    |k| Complex32::new(0.2, k as f32),
                ),
                spectrum_from(|k| Complex32::new((k % 5) as f32, 0.0), |_| Complex32::default()),
                spectrum_from(|_| Complex32::new(100.0, -3.0), |_| Complex32::new(100.0, -3.0)),
            ];
            for (i, spectrum) in spectra.iter().enumerate() {
                let params = ParamSnapshot {
                    bass_cutoff_hz: 120.0 + 200.0 * i as f32,
                    vocals_focus: 1.0,
                    drum_sensitivity: 1.0,
                };
                masks.compute(spectrum, params);
                assert_conserves(&masks);
            }
        }
    }

    #[test]
    fn other_is_the_clamped_residual() {
        let mut masks = MaskComputer::new(StemLayout::Four, SIZE, RATE);
        let s = spectrum_from(|_| Complex32::new(1.0, 0.0), |_| Complex32::new(0.3, 0.0));
        masks.compute(&s, ParamSnapshot::default());
        for bin in 0..SIZE / 2 + 1 {
            let sum: f32 = [Stem::Vocals, Stem::Drums, Stem::Bass]
                .iter()
                .filter_map(|&stem| masks.mask(stem))
                .map(|m| m[bin])
                .sum();
            let other = masks.mask(Stem::Other).map_or(-1.0, |m| m[bin]);
            assert!((other - (1.0 - sum).max(0.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn bass_reach_grows_with_cutoff() {
        let mut masks = MaskComputer::new(StemLayout::Four, SIZE, RATE);
        let s = spectrum_from(|_| Complex32::new(1.0, 0.0), |_| Complex32::new(1.0, 0.0));
        let mut last = 0;
        for hz in [20.0, 60.0, 150.0, 151.0, 400.0, 1000.0] {
            masks.reset();
            masks.compute(
                &s,
                ParamSnapshot {
                    bass_cutoff_hz: hz,
                    ..ParamSnapshot::default()
                },
            );
            let reach = masks
                .mask(Stem::Bass)
                .map_or(0, |m| m.iter().filter(|&&g| g > 0.0).count());
            assert!(reach >= last, "{hz} Hz: {reach} < {last}");
            last = reach;
        }
        assert!(last > 0);
    }

    #[test]
    fn centered_content_favours_vocals_when_focused() {
        let mut masks = MaskComputer::new(StemLayout::Four, SIZE, RATE);
        let s = spectrum_from(|_| Complex32::new(1.0, 0.0), |_| Complex32::new(1.0, 0.0));
        let params = |focus| ParamSnapshot {
            vocals_focus: focus,
            drum_sensitivity: 0.0,
            ..ParamSnapshot::default()
        };
        let bin = masks.freq_to_bin(1000.0);

        masks.compute(&s, params(1.0));
        let focused = masks.mask(Stem::Vocals).map_or(0.0, |m| m[bin]);
        masks.compute(&s, params(0.0));
        let neutral = masks.mask(Stem::Vocals).map_or(0.0, |m| m[bin]);

        assert!(focused > neutral);
        // 0.5 × presence boost, no bass or drums at 1 kHz.
        assert!((neutral - 0.5 * VOCALS_PRESENCE_GAIN).abs() < 1e-5);
        let outside = masks.freq_to_bin(12_000.0);
        assert_eq!(masks.mask(Stem::Vocals).map_or(1.0, |m| m[outside]), 0.0);
    }

    #[test]
    fn onset_goes_to_drums_then_decays() {
        let mut masks = MaskComputer::new(StemLayout::Four, SIZE, RATE);
        let hit = spectrum_from(|_| Complex32::new(1.0, 0.0), |_| Complex32::new(-1.0, 0.0));
        // Fully focused: the anti-phase hit has no center, so no vocals.
        let params = ParamSnapshot {
            vocals_focus: 1.0,
            drum_sensitivity: 1.0,
            ..ParamSnapshot::default()
        };
        let bin = masks.freq_to_bin(6000.0);

        masks.compute(&hit, params);
        let onset = masks.mask(Stem::Drums).map_or(0.0, |m| m[bin]);
        for _ in 0..40 {
            masks.compute(&hit, params);
        }
        let sustained = masks.mask(Stem::Drums).map_or(1.0, |m| m[bin]);
        assert!(onset > 0.9, "onset {onset}");
        assert!(sustained < 0.01, "sustained {sustained}");
    }

    #[test]
    fn silence_only_decays_history() {
        let mut masks = MaskComputer::new(StemLayout::Six, SIZE, RATE);
        let loud = spectrum_from(|_| Complex32::new(2.0, 0.0), |_| Complex32::new(1.0, 1.0));
        masks.compute(&loud, ParamSnapshot::default());
        let before = masks.prev_magnitude().to_vec();

        let silent = StereoSpectrum::new(SIZE / 2 + 1);
        masks.compute(&silent, ParamSnapshot::default());
        for (now, then) in masks.prev_magnitude().iter().zip(&before) {
            assert!((now - then * MAGNITUDE_DECAY).abs() < 1e-6);
        }
        assert!(masks.mask(Stem::Other).is_some_and(|m| m.iter().all(|&g| g == 1.0)));
        assert_conserves(&masks);
    }

    #[test]
    fn six_stem_layout_fills_guitar_and_piano() {
        let mut masks = MaskComputer::new(StemLayout::Six, SIZE, RATE);
        // Hard-left steady content: side-heavy, so guitar and piano both draw.
        let s = spectrum_from(|_| Complex32::new(1.0, 0.0), |_| Complex32::default());
        for _ in 0..20 {
            masks.compute(&s, ParamSnapshot::default());
        }
        let bin = masks.freq_to_bin(1000.0);
        let guitar = masks.mask(Stem::Guitar).map_or(0.0, |m| m[bin]);
        let piano = masks.mask(Stem::Piano).map_or(0.0, |m| m[bin]);
        assert!(guitar > 0.1);
        assert!(piano > 0.05);
        assert_conserves(&masks);
    }
}
