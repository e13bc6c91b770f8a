use sf_audio::fft::{Complex32, FftBackend};
use sf_audio::ring::RingBuffer;
use sf_audio::window::overlap_gain;
use sf_audio::AudioError;
use sf_core::stem::{Stem, StemLayout};

use crate::analyzer::{apply_window, StereoSpectrum};
use crate::masks::MaskComputer;

/// Masked resynthesis of every stem, then windowed overlap-add.
///
/// All stem spectra live in one contiguous buffer (`[stem][channel][bin]`)
/// so the whole frame goes through a single `inverse_batch` call.
///
/// Normalisation: the Hann window is applied on analysis and synthesis, so
/// overlapping frames sum to `Σw² / hop` (1.5 at 75 % overlap); the inverse
/// transform is unnormalized (×`fft_size`). Each frame is therefore scaled by
/// `1 / (fft_size · Σw² / hop)`.
pub struct SpectrumSynthesizer {
    fft_size: usize,
    num_bins: usize,
    window: Vec<f32>,
    scale: f32,
    /// Stems synthesized from the Mid spectrum on both channels.
    from_mid: Vec<bool>,
    spectra: Vec<Complex32>,
    frames: Vec<f32>,
}

impl SpectrumSynthesizer {
    /// Pre-allocate spectra and frames for every stem of `layout`.
    ///
    /// `mono_center_stems` makes bass and vocals mono, sourced from Mid.
    #[must_use]
    pub fn new(layout: StemLayout, window: &[f32], hop: usize, mono_center_stems: bool) -> Self {
        let fft_size = window.len();
        let num_bins = fft_size / 2 + 1;
        let stems = layout.len();
        let from_mid = layout
            .stems()
            .iter()
            .map(|&s| mono_center_stems && matches!(s, Stem::Bass | Stem::Vocals))
            .collect();
        Self {
            fft_size,
            num_bins,
            window: window.to_vec(),
            scale: 1.0 / (fft_size as f32 * overlap_gain(window, hop)),
            from_mid,
            spectra: vec![Complex32::default(); stems * 2 * num_bins],
            frames: vec![0.0; stems * 2 * fft_size],
        }
    }

    /// Gain applied to each frame before accumulation.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Windowed time-domain frame of bus `stem`, channel `ch`, before scaling.
    #[must_use]
    pub fn frame(&self, stem: usize, ch: usize) -> &[f32] {
        let start = (stem * 2 + ch) * self.fft_size;
        &self.frames[start..start + self.fft_size]
    }

    /// Apply masks, inverse-transform every stem/channel at once, window.
    ///
    /// On error every frame is zeroed, so the hop contributes silence.
    ///
    /// # Errors
    /// Whatever the backend reports.
    pub fn synthesize(
        &mut self,
        fft: &mut dyn FftBackend,
        spectrum: &StereoSpectrum,
        masks: &MaskComputer,
    ) -> Result<(), AudioError> {
        let bins = self.num_bins;
        for (stem, chunk) in self.spectra.chunks_mut(2 * bins).enumerate() {
            let mask = masks.mask_at(stem);
            let (left, right) = chunk.split_at_mut(bins);
            if self.from_mid[stem] {
                apply_mask(left, &spectrum.mid, mask);
                apply_mask(right, &spectrum.mid, mask);
            } else {
                apply_mask(left, &spectrum.left, mask);
                apply_mask(right, &spectrum.right, mask);
            }
        }

        if let Err(e) = fft.inverse_batch(&mut self.spectra, &mut self.frames) {
            self.frames.fill(0.0);
            return Err(e);
        }
        for frame in self.frames.chunks_mut(self.fft_size) {
            apply_window(frame, &self.window);
        }
        Ok(())
    }

    /// Add the current frames into the stem output rings, starting at each
    /// ring's read cursor.
    pub fn overlap_add(&self, outputs: &mut [[RingBuffer; 2]]) {
        for (stem, pair) in outputs.iter_mut().enumerate() {
            for (ch, ring) in pair.iter_mut().enumerate() {
                ring.accumulate(self.frame(stem, ch), self.scale);
            }
        }
    }

    /// Zero spectra and frames.
    pub fn reset(&mut self) {
        self.spectra.fill(Complex32::default());
        self.frames.fill(0.0);
    }
}

#[inline(always)]
fn apply_mask(out: &mut [Complex32], source: &[Complex32], mask: &[f32]) {
    for ((o, s), &g) in out.iter_mut().zip(source).zip(mask) {
        *o = s * g;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::WindowedFftAnalyzer;
    use sf_audio::window::hann;
    use sf_audio::CpuBackend;
    use sf_core::params::ParamSnapshot;

    #[test]
    fn scale_matches_hann_at_quarter_hop() {
        let window = hann(1024);
        let synth = SpectrumSynthesizer::new(StemLayout::Four, &window, 256, false);
        assert!((synth.scale() - 1.0 / (1024.0 * 1.5)).abs() < 1e-9);
    }

    #[test]
    fn stem_frames_sum_to_the_windowed_input() -> Result<(), AudioError> {
        let size = 512;
        let mut fft = CpuBackend::new(size)?;
        let mut analyzer = WindowedFftAnalyzer::new(size);
        let mut left = RingBuffer::new(size);
        let mut right = RingBuffer::new(size);
        let signal = |i: usize| {
            let t = i as f32 / 44_100.0;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                + 0.3 * (2.0 * std::f32::consts::PI * 90.0 * t).sin()
        };
        for i in 0..size {
            left.push(signal(i));
            right.push(0.5 * signal(i));
        }
        analyzer.analyze(&mut fft, &left, &right)?;

        let mut masks = MaskComputer::new(StemLayout::Six, size, 44_100.0);
        masks.compute(analyzer.spectrum(), ParamSnapshot::default());
        let mut synth =
            SpectrumSynthesizer::new(StemLayout::Six, analyzer.window(), size / 4, false);
        synth.synthesize(&mut fft, analyzer.spectrum(), &masks)?;

        let window = analyzer.window();
        for n in 0..size {
            let sum_l: f32 = (0..6).map(|s| synth.frame(s, 0)[n]).sum();
            let sum_r: f32 = (0..6).map(|s| synth.frame(s, 1)[n]).sum();
            // inverse(forward(x·w))·w = N·x·w².
            let expected = size as f32 * signal(n) * window[n] * window[n];
            let tolerance = 1e-3 * size as f32;
            assert!((sum_l - expected).abs() < tolerance, "n={n}: {sum_l} vs {expected}");
            assert!((sum_r - 0.5 * expected).abs() < tolerance);
        }
        Ok(())
    }

    #[test]
    fn mono_center_stems_share_both_channels() -> Result<(), AudioError> {
        let size = 256;
        let mut fft = CpuBackend::new(size)?;
        let mut analyzer = WindowedFftAnalyzer::new(size);
        let mut left = RingBuffer::new(size);
        let mut right = RingBuffer::new(size);
        for i in 0..size {
            left.push(((i * 13) % 7) as f32 / 7.0);
            right.push(-(((i * 5) % 3) as f32) / 3.0);
        }
        analyzer.analyze(&mut fft, &left, &right)?;
        let mut masks = MaskComputer::new(StemLayout::Four, size, 44_100.0);
        masks.compute(analyzer.spectrum(), ParamSnapshot::default());

        let mut synth =
            SpectrumSynthesizer::new(StemLayout::Four, analyzer.window(), size / 4, true);
        synth.synthesize(&mut fft, analyzer.spectrum(), &masks)?;
        let bass = StemLayout::Four.index_of(Stem::Bass).unwrap_or(2);
        let drums = StemLayout::Four.index_of(Stem::Drums).unwrap_or(1);
        assert_eq!(synth.frame(bass, 0), synth.frame(bass, 1));
        assert_ne!(synth.frame(drums, 0), synth.frame(drums, 1));
        Ok(())
    }

    #[test]
    fn overlap_add_lands_at_the_read_cursor() {
        let window = hann(64);
        let mut synth = SpectrumSynthesizer::new(StemLayout::Four, &window, 16, false);
        synth.frames.fill(1.0);
        let mut outputs: Vec<[RingBuffer; 2]> =
            (0..4).map(|_| [RingBuffer::new(64), RingBuffer::new(64)]).collect();
        outputs[0][0].pop();
        synth.overlap_add(&mut outputs);
        assert!((outputs[0][0].pop() - synth.scale()).abs() < 1e-12);
        assert_eq!(outputs[3][1].read_pos(), 0);
    }
}
