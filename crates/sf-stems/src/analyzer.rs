use sf_audio::fft::{Complex32, FftBackend};
use sf_audio::ring::RingBuffer;
use sf_audio::window::hann;
use sf_audio::AudioError;

/// Spectra of one analysis frame: left, right, and the derived mid/side.
///
/// `mid = (L + R) / 2`, `side = (L - R) / 2`, bin by bin.
#[derive(Clone, Debug)]
pub struct StereoSpectrum {
    pub left: Vec<Complex32>,
    pub right: Vec<Complex32>,
    pub mid: Vec<Complex32>,
    pub side: Vec<Complex32>,
}

impl StereoSpectrum {
    /// Zeroed spectra of `num_bins` bins.
    #[must_use]
    pub fn new(num_bins: usize) -> Self {
        Self {
            left: vec![Complex32::default(); num_bins],
            right: vec![Complex32::default(); num_bins],
            mid: vec![Complex32::default(); num_bins],
            side: vec![Complex32::default(); num_bins],
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.left.len()
    }

    /// Zero all four spectra.
    pub fn clear(&mut self) {
        self.left.fill(Complex32::default());
        self.right.fill(Complex32::default());
        self.mid.fill(Complex32::default());
        self.side.fill(Complex32::default());
    }

    fn derive_mid_side(&mut self) {
        for (((m, s), l), r) in self
            .mid
            .iter_mut()
            .zip(self.side.iter_mut())
            .zip(&self.left)
            .zip(&self.right)
        {
            *m = (l + r) * 0.5;
            *s = (l - r) * 0.5;
        }
    }
}

/// Windowed forward transform of the most recent input frame.
///
/// Stateless between calls: the result depends only on the last `fft_size`
/// samples of each input ring and on the fixed Hann table.
///
/// # Example
/// ```
/// use sf_audio::{CpuBackend, RingBuffer};
/// use sf_stems::analyzer::WindowedFftAnalyzer;
///
/// let mut fft = CpuBackend::new(256).unwrap();
/// let mut analyzer = WindowedFftAnalyzer::new(256);
/// let (left, right) = (RingBuffer::new(256), RingBuffer::new(256));
/// analyzer.analyze(&mut fft, &left, &right).unwrap();
/// assert_eq!(analyzer.spectrum().num_bins(), 129);
/// ```
pub struct WindowedFftAnalyzer {
    window: Vec<f32>,
    frame_left: Vec<f32>,
    frame_right: Vec<f32>,
    spectrum: StereoSpectrum,
}

impl WindowedFftAnalyzer {
    /// Pre-allocate frames and spectra for `fft_size`.
    #[must_use]
    pub fn new(fft_size: usize) -> Self {
        Self {
            window: hann(fft_size),
            frame_left: vec![0.0; fft_size],
            frame_right: vec![0.0; fft_size],
            spectrum: StereoSpectrum::new(fft_size / 2 + 1),
        }
    }

    /// Analysis window, shared with the synthesizer.
    #[must_use]
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Spectra of the last analyzed frame.
    #[must_use]
    pub fn spectrum(&self) -> &StereoSpectrum {
        &self.spectrum
    }

    /// Unwrap the last `fft_size` samples of both rings, window them, and
    /// transform L and R in one batched call.
    ///
    /// On error the spectra are zeroed, so a failed frame is silent.
    ///
    /// # Errors
    /// Whatever the backend reports.
    pub fn analyze(
        &mut self,
        fft: &mut dyn FftBackend,
        left: &RingBuffer,
        right: &RingBuffer,
    ) -> Result<(), AudioError> {
        left.peek_window(&mut self.frame_left);
        right.peek_window(&mut self.frame_right);
        apply_window(&mut self.frame_left, &self.window);
        apply_window(&mut self.frame_right, &self.window);

        let result = fft.forward_batch(
            &mut self.frame_left,
            &mut self.frame_right,
            &mut self.spectrum.left,
            &mut self.spectrum.right,
        );
        match result {
            Ok(()) => {
                self.spectrum.derive_mid_side();
                Ok(())
            }
            Err(e) => {
                self.spectrum.clear();
                Err(e)
            }
        }
    }

    /// Zero the held spectra.
    pub fn reset(&mut self) {
        self.spectrum.clear();
    }
}

#[inline(always)]
pub(crate) fn apply_window(frame: &mut [f32], window: &[f32]) {
    for (s, &w) in frame.iter_mut().zip(window) {
        *s *= w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_audio::CpuBackend;

    fn filled(size: usize, f: impl Fn(usize) -> f32) -> RingBuffer {
        let mut ring = RingBuffer::new(size);
        for i in 0..size * 2 + 17 {
            ring.push(f(i));
        }
        ring
    }

    #[test]
    fn mid_side_follow_the_channels() -> Result<(), AudioError> {
        let size = 256;
        let mut fft = CpuBackend::new(size)?;
        let mut analyzer = WindowedFftAnalyzer::new(size);
        let tone = |i: usize| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / size as f32).sin();
        let left = filled(size, tone);
        let right = filled(size, tone);
        analyzer.analyze(&mut fft, &left, &right)?;

        let spectrum = analyzer.spectrum();
        for k in 0..spectrum.num_bins() {
            assert!(spectrum.side[k].norm() < 1e-4);
            assert!((spectrum.mid[k] - spectrum.left[k]).norm() < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn same_window_gives_same_spectrum() -> Result<(), AudioError> {
        let size = 256;
        let mut fft = CpuBackend::new(size)?;
        let mut analyzer = WindowedFftAnalyzer::new(size);
        let left = filled(size, |i| ((i * 31) % 17) as f32 / 17.0 - 0.5);
        let right = filled(size, |i| ((i * 7) % 11) as f32 / 11.0 - 0.5);

        analyzer.analyze(&mut fft, &left, &right)?;
        let first = analyzer.spectrum().clone();
        analyzer.analyze(&mut fft, &left, &right)?;
        assert_eq!(first.left, analyzer.spectrum().left);
        assert_eq!(first.right, analyzer.spectrum().right);
        Ok(())
    }

    #[test]
    fn silence_has_an_empty_spectrum() -> Result<(), AudioError> {
        let size = 512;
        let mut fft = CpuBackend::new(size)?;
        let mut analyzer = WindowedFftAnalyzer::new(size);
        let silent = RingBuffer::new(size);
        analyzer.analyze(&mut fft, &silent, &silent)?;
        assert!(analyzer.spectrum().mid.iter().all(|c| c.norm() == 0.0));
        Ok(())
    }
}
