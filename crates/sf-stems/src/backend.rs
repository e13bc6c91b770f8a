use sf_audio::fft::{CpuBackend, FftBackend};
use sf_audio::AudioError;
use sf_core::config::BackendPreference;
use sf_gpu::{GpuBackend, GpuOptions};

/// FFT strategy chosen once at `prepare` time.
pub struct BackendChoice {
    /// Backend the engine runs on.
    pub primary: Box<dyn FftBackend>,
    /// Pre-allocated CPU backend to demote to if the GPU fails mid-stream.
    /// `None` when `primary` already is the CPU.
    pub fallback: Option<Box<dyn FftBackend>>,
    /// Why the GPU is not in use, when it was asked for.
    pub gpu_note: Option<String>,
}

impl BackendChoice {
    /// `true` when `primary` runs on a GPU.
    #[must_use]
    pub fn is_gpu(&self) -> bool {
        self.primary.is_gpu()
    }
}

/// Build the backend for `preference`.
///
/// `Auto` and `Gpu` probe the device once; any probe failure yields the CPU
/// backend for good. `Gpu` logs the fallback as a warning, `Auto` as info.
///
/// # Errors
/// Only if the CPU transform itself cannot be planned for `fft_size`.
///
/// # Example
/// ```
/// use sf_core::config::BackendPreference;
/// use sf_gpu::GpuOptions;
/// use sf_stems::backend::select_backend;
///
/// let choice = select_backend(BackendPreference::Cpu, 1024, GpuOptions::default()).unwrap();
/// assert!(!choice.is_gpu());
/// assert!(choice.fallback.is_none());
/// ```
pub fn select_backend(
    preference: BackendPreference,
    fft_size: usize,
    options: GpuOptions,
) -> Result<BackendChoice, AudioError> {
    let cpu = Box::new(CpuBackend::new(fft_size)?);
    if preference == BackendPreference::Cpu {
        log::info!("FFT backend: CPU (forced), size {fft_size}");
        return Ok(BackendChoice {
            primary: cpu,
            fallback: None,
            gpu_note: None,
        });
    }

    let gpu = GpuBackend::probed(fft_size, options);
    if gpu.is_ready() {
        log::info!("FFT backend: {}", gpu.info());
        return Ok(BackendChoice {
            primary: Box::new(gpu),
            fallback: Some(cpu),
            gpu_note: None,
        });
    }

    let note = gpu.info().to_string();
    if preference == BackendPreference::Gpu {
        log::warn!("GPU requested but unavailable, using CPU: {note}");
    } else {
        log::info!("FFT backend: CPU ({note})");
    }
    Ok(BackendChoice {
        primary: cpu,
        fallback: None,
        gpu_note: Some(note),
    })
}
