use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::AudioError;

/// Complex bin type shared by every backend.
pub type Complex32 = realfft::num_complex::Complex<f32>;

/// Real-signal FFT capability: the seam between the separator and its
/// transform hardware.
///
/// Conventions, identical for every implementation:
/// - `forward` maps `fft_size` reals to `fft_size / 2 + 1` bins, unnormalized;
/// - `inverse` maps bins back to `fft_size` reals, unnormalized, so
///   `inverse(forward(x)) == fft_size * x`;
/// - inputs may be clobbered (used as scratch);
/// - imaginary parts of the DC and Nyquist bins are ignored by `inverse`.
///
/// CONTRAT : `forward`, `inverse`, `forward_batch` et `inverse_batch` ne
/// doivent PAS allouer. Tout est pré-alloué à la construction.
pub trait FftBackend: Send {
    /// Frame length this backend was planned for.
    fn fft_size(&self) -> usize;

    /// Number of bins, `fft_size / 2 + 1`.
    fn num_bins(&self) -> usize {
        self.fft_size() / 2 + 1
    }

    /// `true` when transforms run on a GPU.
    fn is_gpu(&self) -> bool {
        false
    }

    /// Human-readable description for status displays.
    fn describe(&self) -> String;

    /// Forward real → complex transform of one frame.
    ///
    /// # Errors
    /// Returns an error on a length mismatch or a transform failure.
    fn forward(&mut self, input: &mut [f32], output: &mut [Complex32]) -> Result<(), AudioError>;

    /// Inverse complex → real transform of one spectrum.
    ///
    /// # Errors
    /// Returns an error on a length mismatch or a transform failure.
    fn inverse(&mut self, input: &mut [Complex32], output: &mut [f32]) -> Result<(), AudioError>;

    /// Forward transform of a stereo frame pair as one operation.
    ///
    /// Must match two independent `forward` calls within float tolerance.
    ///
    /// # Errors
    /// Returns an error on a length mismatch or a transform failure.
    fn forward_batch(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        out_left: &mut [Complex32],
        out_right: &mut [Complex32],
    ) -> Result<(), AudioError> {
        self.forward(left, out_left)?;
        self.forward(right, out_right)
    }

    /// Inverse transform of `spectra.len() / num_bins` contiguous spectra
    /// into as many contiguous frames.
    ///
    /// # Errors
    /// Returns an error on a length mismatch or a transform failure.
    fn inverse_batch(
        &mut self,
        spectra: &mut [Complex32],
        frames: &mut [f32],
    ) -> Result<(), AudioError> {
        let bins = self.num_bins();
        let size = self.fft_size();
        check_batch(spectra.len(), bins, frames.len(), size)?;
        for (spectrum, frame) in spectra.chunks_mut(bins).zip(frames.chunks_mut(size)) {
            self.inverse(spectrum, frame)?;
        }
        Ok(())
    }
}

/// Validate a contiguous batch: same frame count on both sides.
///
/// # Errors
/// Returns `BufferLength` when the buffers do not describe the same batch.
pub fn check_batch(
    spectra_len: usize,
    bins: usize,
    frames_len: usize,
    size: usize,
) -> Result<usize, AudioError> {
    if spectra_len % bins != 0 {
        return Err(AudioError::BufferLength {
            expected: bins,
            got: spectra_len % bins,
        });
    }
    let count = spectra_len / bins;
    if frames_len != count * size {
        return Err(AudioError::BufferLength {
            expected: count * size,
            got: frames_len,
        });
    }
    Ok(count)
}

/// CPU FFT backend: realfft forward and inverse plans.
///
/// Pre-allocates both plans and a shared scratch buffer for a zero-allocation
/// hot path.
///
/// # Example
/// ```
/// use sf_audio::fft::{CpuBackend, FftBackend, Complex32};
/// let mut fft = CpuBackend::new(256).unwrap();
/// let mut frame = vec![1.0f32; 256];
/// let mut bins = vec![Complex32::default(); 129];
/// fft.forward(&mut frame, &mut bins).unwrap();
/// assert!((bins[0].re - 256.0).abs() < 1e-3);
/// ```
pub struct CpuBackend {
    fft_size: usize,
    forward_plan: Arc<dyn RealToComplex<f32>>,
    inverse_plan: Arc<dyn ComplexToReal<f32>>,
    scratch: Vec<Complex32>,
}

impl CpuBackend {
    /// Plan forward and inverse transforms of length `fft_size`.
    ///
    /// # Errors
    /// Returns `InvalidFftSize` if `fft_size` is zero or odd.
    pub fn new(fft_size: usize) -> Result<Self, AudioError> {
        if fft_size < 2 || fft_size % 2 != 0 {
            return Err(AudioError::InvalidFftSize(fft_size));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let forward_plan = planner.plan_fft_forward(fft_size);
        let inverse_plan = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward_plan
            .get_scratch_len()
            .max(inverse_plan.get_scratch_len());

        Ok(Self {
            fft_size,
            forward_plan,
            inverse_plan,
            scratch: vec![Complex32::default(); scratch_len],
        })
    }
}

impl FftBackend for CpuBackend {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn describe(&self) -> String {
        "CPU Processing (realfft)".to_string()
    }

    fn forward(&mut self, input: &mut [f32], output: &mut [Complex32]) -> Result<(), AudioError> {
        check_len(input.len(), self.fft_size)?;
        check_len(output.len(), self.num_bins())?;
        self.forward_plan
            .process_with_scratch(input, output, &mut self.scratch)
            .map_err(|_| AudioError::Transform("realfft forward"))
    }

    fn inverse(&mut self, input: &mut [Complex32], output: &mut [f32]) -> Result<(), AudioError> {
        check_len(input.len(), self.num_bins())?;
        check_len(output.len(), self.fft_size)?;
        // realfft refuses non-zero imaginary parts at DC and Nyquist.
        input[0].im = 0.0;
        let last = input.len() - 1;
        input[last].im = 0.0;
        self.inverse_plan
            .process_with_scratch(input, output, &mut self.scratch)
            .map_err(|_| AudioError::Transform("realfft inverse"))
    }
}

#[inline(always)]
fn check_len(got: usize, expected: usize) -> Result<(), AudioError> {
    if got == expected {
        Ok(())
    } else {
        Err(AudioError::BufferLength { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(size: usize, cycles: f32) -> Vec<f32> {
        (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * cycles * i as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn forward_inverse_scales_by_fft_size() -> Result<(), AudioError> {
        let size = 512;
        let mut fft = CpuBackend::new(size)?;
        let original = tone(size, 7.0);
        let mut frame = original.clone();
        let mut bins = vec![Complex32::default(); fft.num_bins()];
        fft.forward(&mut frame, &mut bins)?;
        let mut back = vec![0.0; size];
        fft.inverse(&mut bins, &mut back)?;
        for (a, b) in original.iter().zip(&back) {
            assert!((a * size as f32 - b).abs() < 1e-2);
        }
        Ok(())
    }

    #[test]
    fn pure_tone_lands_in_its_bin() -> Result<(), AudioError> {
        let size = 256;
        let mut fft = CpuBackend::new(size)?;
        let mut frame = tone(size, 16.0);
        let mut bins = vec![Complex32::default(); 129];
        fft.forward(&mut frame, &mut bins)?;
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(16));
        Ok(())
    }

    #[test]
    fn wrong_lengths_are_reported() -> Result<(), AudioError> {
        let mut fft = CpuBackend::new(64)?;
        let mut frame = vec![0.0; 63];
        let mut bins = vec![Complex32::default(); 33];
        assert!(matches!(
            fft.forward(&mut frame, &mut bins),
            Err(AudioError::BufferLength { expected: 64, got: 63 })
        ));
        assert!(CpuBackend::new(0).is_err());
        Ok(())
    }

    #[test]
    fn inverse_batch_matches_single_inverses() -> Result<(), AudioError> {
        let size = 128;
        let bins = size / 2 + 1;
        let mut fft = CpuBackend::new(size)?;
        let mut spectra = vec![Complex32::default(); bins * 3];
        for (i, c) in spectra.iter_mut().enumerate() {
            *c = Complex32::new((i % 7) as f32, (i % 3) as f32 - 1.0);
        }
        let mut reference = vec![0.0; size * 3];
        for k in 0..3 {
            let mut one = spectra[k * bins..(k + 1) * bins].to_vec();
            fft.inverse(&mut one, &mut reference[k * size..(k + 1) * size])?;
        }
        let mut frames = vec![0.0; size * 3];
        fft.inverse_batch(&mut spectra, &mut frames)?;
        for (a, b) in reference.iter().zip(&frames) {
            assert!((a - b).abs() < 1e-3);
        }
        Ok(())
    }
}
