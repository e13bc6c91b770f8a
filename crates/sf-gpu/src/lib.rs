// Optional GPU FFT offload for stemforge.
//
// `GpuBackend` is an explicit context object owned by one engine: no global
// device, no singleton. It implements `sf_audio::FftBackend` so the engine
// treats it exactly like the CPU transform.

#[cfg(feature = "wgpu")]
pub mod device;
pub mod error;

use sf_audio::fft::{check_batch, Complex32, FftBackend};
use sf_audio::AudioError;

pub use error::GpuError;

/// Frames per submission by default: six stems × two channels.
pub const DEFAULT_MAX_BATCH: usize = 12;

/// Accepted relative error of the probe self-test against realfft.
pub const SELF_TEST_TOLERANCE: f32 = 1e-3;

/// Lifecycle of the GPU context.
///
/// `Uninitialized → Probing → {Ready | Unavailable}`. `Unavailable` is
/// terminal: there is no retry and no partial GPU use afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuState {
    Uninitialized,
    Probing,
    Ready,
    Unavailable,
}

/// Options du probe GPU.
#[derive(Clone, Copy, Debug)]
pub struct GpuOptions {
    /// Largest number of frames sent in one submission.
    pub max_batch: usize,
    /// Accept software adapters (llvmpipe, WARP). Off for real use.
    pub allow_software: bool,
    /// Run the forward/inverse self-test against realfft before going `Ready`.
    pub verify: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            allow_software: false,
            verify: true,
        }
    }
}

/// GPU FFT backend with an explicit probe step.
///
/// # Example
/// ```
/// use sf_gpu::{GpuBackend, GpuOptions, GpuState};
/// let mut gpu = GpuBackend::new(2048, GpuOptions::default());
/// assert_eq!(gpu.state(), GpuState::Uninitialized);
/// let _ = gpu.probe();
/// assert!(matches!(gpu.state(), GpuState::Ready | GpuState::Unavailable));
/// gpu.release();
/// assert!(!gpu.is_ready());
/// ```
pub struct GpuBackend {
    fft_size: usize,
    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    options: GpuOptions,
    state: GpuState,
    info: String,
    last_error: Option<GpuError>,
    #[cfg(feature = "wgpu")]
    device: Option<device::WgpuFft>,
}

impl GpuBackend {
    /// Create an unprobed backend. Touches no device.
    #[must_use]
    pub fn new(fft_size: usize, options: GpuOptions) -> Self {
        Self {
            fft_size,
            options,
            state: GpuState::Uninitialized,
            info: "GPU non initialisé".to_string(),
            last_error: None,
            #[cfg(feature = "wgpu")]
            device: None,
        }
    }

    /// `new` followed by `probe`, errors kept in `last_error`.
    #[must_use]
    pub fn probed(fft_size: usize, options: GpuOptions) -> Self {
        let mut gpu = Self::new(fft_size, options);
        if let Err(e) = gpu.probe() {
            log::info!("GPU FFT unavailable: {e}");
        }
        gpu
    }

    /// Look for a compute device, allocate, and optionally self-test.
    ///
    /// Only the first call does anything; later calls report the outcome of
    /// the first one.
    ///
    /// # Errors
    /// The reason the backend ended up `Unavailable`.
    pub fn probe(&mut self) -> Result<(), GpuError> {
        match self.state {
            GpuState::Ready => return Ok(()),
            GpuState::Unavailable | GpuState::Probing => {
                return Err(self
                    .last_error
                    .clone()
                    .unwrap_or(GpuError::Unsupported("probe déjà échoué")));
            }
            GpuState::Uninitialized => {}
        }
        self.state = GpuState::Probing;

        match self.open() {
            Ok(info) => {
                self.state = GpuState::Ready;
                self.info = info;
                Ok(())
            }
            Err(e) => {
                self.teardown();
                self.state = GpuState::Unavailable;
                self.info = format!("GPU indisponible ({e})");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    #[cfg(feature = "wgpu")]
    fn open(&mut self) -> Result<String, GpuError> {
        let mut fft = device::WgpuFft::new(
            self.fft_size,
            self.options.max_batch.max(2),
            device::AdapterRequest {
                allow_software: self.options.allow_software,
            },
        )?;
        if self.options.verify {
            self_test(&mut fft, self.fft_size)?;
        }
        let info = format!("GPU: {}", fft.describe());
        self.device = Some(fft);
        Ok(info)
    }

    #[cfg(not(feature = "wgpu"))]
    #[allow(clippy::unused_self)]
    fn open(&mut self) -> Result<String, GpuError> {
        Err(GpuError::Unsupported("compilé sans la feature `wgpu`"))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GpuState {
        self.state
    }

    /// `true` once the probe succeeded and until `release`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == GpuState::Ready
    }

    /// Adapter description, or the reason it is unavailable.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Last probe or transform error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&GpuError> {
        self.last_error.as_ref()
    }

    /// Tear down every device resource. Idempotent.
    pub fn release(&mut self) {
        if self.state == GpuState::Ready {
            log::debug!("Releasing GPU FFT ({})", self.info);
        }
        self.teardown();
        if self.state != GpuState::Uninitialized {
            self.state = GpuState::Unavailable;
        }
    }

    fn teardown(&mut self) {
        #[cfg(feature = "wgpu")]
        {
            self.device = None;
        }
    }

    #[cfg(feature = "wgpu")]
    fn device(&mut self) -> Result<&mut device::WgpuFft, AudioError> {
        self.device
            .as_mut()
            .ok_or(AudioError::Transform("GPU backend not ready"))
    }

    #[cfg(feature = "wgpu")]
    fn record(&mut self, e: GpuError, what: &'static str) -> AudioError {
        self.last_error = Some(e);
        AudioError::Transform(what)
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        self.release();
    }
}

impl FftBackend for GpuBackend {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        self.info.clone()
    }

    #[cfg(feature = "wgpu")]
    fn forward(&mut self, input: &mut [f32], output: &mut [Complex32]) -> Result<(), AudioError> {
        let result = self.device()?.forward(&[&*input], &mut [output]);
        result.map_err(|e| self.record(e, "GPU forward"))
    }

    #[cfg(not(feature = "wgpu"))]
    fn forward(&mut self, _input: &mut [f32], _output: &mut [Complex32]) -> Result<(), AudioError> {
        Err(AudioError::Transform("GPU backend not ready"))
    }

    #[cfg(feature = "wgpu")]
    fn inverse(&mut self, input: &mut [Complex32], output: &mut [f32]) -> Result<(), AudioError> {
        self.inverse_batch(input, output)
    }

    #[cfg(not(feature = "wgpu"))]
    fn inverse(&mut self, _input: &mut [Complex32], _output: &mut [f32]) -> Result<(), AudioError> {
        Err(AudioError::Transform("GPU backend not ready"))
    }

    #[cfg(feature = "wgpu")]
    fn forward_batch(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        out_left: &mut [Complex32],
        out_right: &mut [Complex32],
    ) -> Result<(), AudioError> {
        let result = self
            .device()?
            .forward(&[&*left, &*right], &mut [out_left, out_right]);
        result.map_err(|e| self.record(e, "GPU forward batch"))
    }

    #[cfg(feature = "wgpu")]
    fn inverse_batch(
        &mut self,
        spectra: &mut [Complex32],
        frames: &mut [f32],
    ) -> Result<(), AudioError> {
        let bins = self.num_bins();
        let size = self.fft_size;
        let count = check_batch(spectra.len(), bins, frames.len(), size)?;
        let max = self.device()?.max_batch();
        // Larger batches are split into submissions of at most `max` frames.
        let mut done = 0;
        while done < count {
            let n = (count - done).min(max);
            let spectra = &spectra[done * bins..(done + n) * bins];
            let frames = &mut frames[done * size..(done + n) * size];
            let result = self.device()?.inverse(spectra, frames);
            result.map_err(|e| self.record(e, "GPU inverse batch"))?;
            done += n;
        }
        Ok(())
    }

    #[cfg(not(feature = "wgpu"))]
    fn inverse_batch(
        &mut self,
        spectra: &mut [Complex32],
        frames: &mut [f32],
    ) -> Result<(), AudioError> {
        check_batch(spectra.len(), self.num_bins(), frames.len(), self.fft_size)?;
        Err(AudioError::Transform("GPU backend not ready"))
    }
}

/// Compare a GPU forward/inverse pair with realfft on a fixed test signal.
#[cfg(feature = "wgpu")]
fn self_test(fft: &mut device::WgpuFft, fft_size: usize) -> Result<(), GpuError> {
    let mut cpu = sf_audio::CpuBackend::new(fft_size)
        .map_err(|_| GpuError::Unsupported("taille FFT refusée par realfft"))?;
    let bins = fft_size / 2 + 1;

    let signal: Vec<f32> = (0..fft_size)
        .map(|i| {
            let t = i as f32 / fft_size as f32;
            (2.0 * std::f32::consts::PI * 5.0 * t).sin()
                + 0.5 * (2.0 * std::f32::consts::PI * 37.0 * t).cos()
                + 0.25 * ((i * 7919) % 97) as f32 / 97.0
        })
        .collect();

    let mut reference = vec![Complex32::default(); bins];
    cpu.forward(&mut signal.clone(), &mut reference)
        .map_err(|_| GpuError::Unsupported("référence CPU"))?;

    let mut gpu_bins = vec![Complex32::default(); bins];
    fft.forward(&[signal.as_slice()], &mut [gpu_bins.as_mut_slice()])?;
    let forward_error = relative_error(
        reference.iter().zip(&gpu_bins).map(|(a, b)| ((a - b).norm(), a.norm())),
    );

    let mut reference_frame = vec![0.0; fft_size];
    cpu.inverse(&mut reference.clone(), &mut reference_frame)
        .map_err(|_| GpuError::Unsupported("référence CPU"))?;
    let mut gpu_frame = vec![0.0; fft_size];
    fft.inverse(&reference, &mut gpu_frame)?;
    let inverse_error = relative_error(
        reference_frame
            .iter()
            .zip(&gpu_frame)
            .map(|(a, b)| ((a - b).abs(), a.abs())),
    );

    let error = forward_error.max(inverse_error);
    log::debug!("GPU FFT self-test: forward {forward_error:.2e}, inverse {inverse_error:.2e}");
    if error > SELF_TEST_TOLERANCE {
        return Err(GpuError::SelfTest {
            error,
            tolerance: SELF_TEST_TOLERANCE,
        });
    }
    Ok(())
}

/// Largest absolute deviation relative to the largest reference magnitude.
#[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
fn relative_error(pairs: impl Iterator<Item = (f32, f32)>) -> f32 {
    let (worst, peak) = pairs.fold((0.0f32, 0.0f32), |(worst, peak), (diff, mag)| {
        (worst.max(diff), peak.max(mag))
    });
    worst / (peak + 1e-10)
}
