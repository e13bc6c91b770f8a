use std::sync::Arc;

use sf_audio::fft::FftBackend;
use sf_audio::ring::RingBuffer;
use sf_core::config::SeparatorConfig;
use sf_core::params::{ParamSnapshot, SeparationParams};
use sf_core::stem::StemSet;
use sf_core::traits::StemSeparator;
use sf_gpu::GpuOptions;

use crate::analyzer::WindowedFftAnalyzer;
use crate::backend::select_backend;
use crate::masks::MaskComputer;
use crate::synth::SpectrumSynthesizer;

/// Streaming overlap-add stem separator.
///
/// Per input sample:
/// 1. push L/R into the input rings;
/// 2. pop (read once, zero) every stem's output slot into the block;
/// 3. count down the hop; at zero run analysis → masks → synthesis and
///    overlap-add the new frame starting at the output read cursor.
///
/// A frame analysed at sample `n` covers inputs `n − N + 1 ..= n` and its
/// first sample is popped at `n + 1`, so every stem lags the input by exactly
/// `fft_size` samples.
///
/// Real-time contract: `process` never allocates, locks, logs or panics.
/// Failures (transform errors) zero the affected hop and bump
/// [`fault_count`](Self::fault_count). A GPU that fails mid-stream is swapped
/// for the pre-allocated CPU backend and parked until the next `prepare`.
///
/// # Example
/// ```
/// use sf_core::config::{BackendPreference, SeparatorConfig};
/// use sf_core::traits::StemSeparator;
/// use sf_stems::engine::StemEngine;
///
/// let config = SeparatorConfig { backend: BackendPreference::Cpu, ..Default::default() };
/// let mut engine = StemEngine::new(config);
/// engine.prepare(44_100.0, 512);
///
/// let left = vec![0.1f32; 512];
/// let right = vec![-0.1f32; 512];
/// engine.process(&[&left, &right]);
/// assert_eq!(engine.stems().len(), 512);
/// assert_eq!(engine.latency_samples(), 2048);
/// ```
pub struct StemEngine {
    config: SeparatorConfig,
    params: Arc<SeparationParams>,
    gpu_options: GpuOptions,
    sample_rate: f64,
    strategy: Option<Strategy>,
    pipeline: Option<Pipeline>,
    stems: StemSet,
    faults: u64,
}

/// FFT backend held for the engine's lifetime, plus the demotion slots.
struct Strategy {
    active: Box<dyn FftBackend>,
    fallback: Option<Box<dyn FftBackend>>,
    /// GPU backend parked after a runtime failure; dropped at `prepare`.
    retired: Option<Box<dyn FftBackend>>,
    demoted: bool,
    gpu_note: Option<String>,
}

impl Strategy {
    /// Swap in the CPU fallback. Moves boxes only, never allocates.
    fn demote(&mut self) -> bool {
        let Some(cpu) = self.fallback.take() else {
            return false;
        };
        let gpu = std::mem::replace(&mut self.active, cpu);
        self.retired = Some(gpu);
        self.demoted = true;
        true
    }
}

/// Everything sized by `prepare`.
struct Pipeline {
    analyzer: WindowedFftAnalyzer,
    masks: MaskComputer,
    synth: SpectrumSynthesizer,
    inputs: [RingBuffer; 2],
    /// `outputs[stem][channel]`.
    outputs: Vec<[RingBuffer; 2]>,
    hop: usize,
    countdown: usize,
}

impl Pipeline {
    fn clear(&mut self) {
        for ring in &mut self.inputs {
            ring.clear();
        }
        for pair in &mut self.outputs {
            for ring in pair.iter_mut() {
                ring.clear();
            }
        }
        self.analyzer.reset();
        self.masks.reset();
        self.synth.reset();
        self.countdown = self.hop;
    }

    /// One analysis → masks → synthesis cycle. Returns the number of faults.
    fn run_hop(&mut self, strategy: &mut Strategy, params: ParamSnapshot) -> u64 {
        let mut faults = 0;

        let [left, right] = &self.inputs;
        if self
            .analyzer
            .analyze(strategy.active.as_mut(), left, right)
            .is_err()
        {
            faults += 1;
            if strategy.demote()
                && self
                    .analyzer
                    .analyze(strategy.active.as_mut(), left, right)
                    .is_err()
            {
                faults += 1;
            }
        }

        self.masks.compute(self.analyzer.spectrum(), params);

        let spectrum = self.analyzer.spectrum();
        if self
            .synth
            .synthesize(strategy.active.as_mut(), spectrum, &self.masks)
            .is_err()
        {
            faults += 1;
            if strategy.demote()
                && self
                    .synth
                    .synthesize(strategy.active.as_mut(), spectrum, &self.masks)
                    .is_err()
            {
                faults += 1;
            }
        }

        self.synth.overlap_add(&mut self.outputs);
        faults
    }
}

impl StemEngine {
    /// Create an unprepared engine. `config` is clamped first.
    #[must_use]
    pub fn new(config: SeparatorConfig) -> Self {
        let params = Arc::new(config.params());
        Self::with_params(config, params)
    }

    /// Create an engine reading an externally owned parameter block.
    #[must_use]
    pub fn with_params(mut config: SeparatorConfig, params: Arc<SeparationParams>) -> Self {
        config.clamp_all();
        let stems = StemSet::new(config.layout, 0);
        Self {
            config,
            params,
            gpu_options: GpuOptions::default(),
            sample_rate: 0.0,
            strategy: None,
            pipeline: None,
            stems,
            faults: 0,
        }
    }

    /// Options used when the GPU is probed at the first `prepare`.
    #[must_use]
    pub fn with_gpu_options(mut self, options: GpuOptions) -> Self {
        self.gpu_options = options;
        self
    }

    /// Effective (clamped) configuration.
    #[must_use]
    pub fn config(&self) -> &SeparatorConfig {
        &self.config
    }

    /// Shared parameter block, for control threads.
    #[must_use]
    pub fn params(&self) -> Arc<SeparationParams> {
        Arc::clone(&self.params)
    }

    /// Set the bass cutoff (Hz), clamped to [20, 1000].
    pub fn set_bass_cutoff(&self, hz: f32) {
        self.params.set_bass_cutoff(hz);
    }

    /// Set the vocals focus, clamped to [0, 1].
    pub fn set_vocals_focus(&self, focus: f32) {
        self.params.set_vocals_focus(focus);
    }

    /// Set the drum sensitivity, clamped to [0, 1].
    pub fn set_drum_sensitivity(&self, sensitivity: f32) {
        self.params.set_drum_sensitivity(sensitivity);
    }

    /// `true` once `prepare` succeeded.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Sample rate given to the last `prepare`, 0 before.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Largest block `process` fills without dropping output.
    #[must_use]
    pub fn max_block_size(&self) -> usize {
        self.stems.capacity()
    }

    /// Samples between analysis frames.
    #[must_use]
    pub fn hop_size(&self) -> usize {
        self.config.hop_size()
    }

    /// `true` while transforms run on the GPU.
    #[must_use]
    pub fn is_using_gpu(&self) -> bool {
        self.strategy.as_ref().is_some_and(|s| s.active.is_gpu())
    }

    /// Backend description for status displays. Never affects processing.
    #[must_use]
    pub fn gpu_info(&self) -> String {
        let Some(strategy) = &self.strategy else {
            return "Backend non initialisé (prepare requis)".to_string();
        };
        let active = strategy.active.describe();
        if strategy.active.is_gpu() {
            active
        } else if strategy.demoted {
            format!("{active}, GPU désactivé après une erreur")
        } else if let Some(note) = &strategy.gpu_note {
            format!("{active}, {note}")
        } else {
            active
        }
    }

    /// Transform failures since the last `prepare`.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults
    }
}

impl StemSeparator for StemEngine {
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            log::warn!("Invalid sample rate {sample_rate}, using 44100 Hz");
            44_100.0
        };
        let max_block_size = max_block_size.max(1);
        let fft_size = self.config.fft_size;
        let layout = self.config.layout;

        // The backend is chosen once; later calls only drop a parked GPU.
        if let Some(strategy) = &mut self.strategy {
            if strategy.retired.take().is_some() {
                log::info!("Dropping GPU backend retired after a runtime failure");
            }
        } else {
            match select_backend(self.config.backend, fft_size, self.gpu_options) {
                Ok(choice) => {
                    self.strategy = Some(Strategy {
                        active: choice.primary,
                        fallback: choice.fallback,
                        retired: None,
                        demoted: false,
                        gpu_note: choice.gpu_note,
                    });
                }
                Err(e) => {
                    log::error!("No FFT backend for size {fft_size}: {e}");
                    self.pipeline = None;
                    self.stems = StemSet::new(layout, 0);
                    return;
                }
            }
        }

        let hop = self.config.hop_size();
        let analyzer = WindowedFftAnalyzer::new(fft_size);
        let synth = SpectrumSynthesizer::new(
            layout,
            analyzer.window(),
            hop,
            self.config.mono_center_stems,
        );
        self.pipeline = Some(Pipeline {
            masks: MaskComputer::new(layout, fft_size, sample_rate as f32),
            analyzer,
            synth,
            inputs: [RingBuffer::new(fft_size), RingBuffer::new(fft_size)],
            outputs: (0..layout.len())
                .map(|_| [RingBuffer::new(fft_size), RingBuffer::new(fft_size)])
                .collect(),
            hop,
            countdown: hop,
        });
        self.stems = StemSet::new(layout, max_block_size);
        self.sample_rate = sample_rate;
        self.faults = 0;

        log::info!(
            "StemEngine prepared: {} stems, FFT {fft_size}, hop {hop}, {sample_rate} Hz, block {max_block_size}, {}",
            layout.len(),
            self.gpu_info()
        );
    }

    fn reset(&mut self) {
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.clear();
        }
        self.stems.clear();
    }

    fn process(&mut self, block: &[&[f32]]) {
        let (Some(pipeline), Some(strategy)) = (&mut self.pipeline, &mut self.strategy) else {
            self.stems.clear();
            return;
        };
        let Some(left) = block.first() else {
            self.stems.clear();
            return;
        };
        let right = block.get(1).copied().unwrap_or(&[]);

        let frames = left.len();
        // Past the prepared capacity the stream still advances, output is dropped.
        let visible = frames.min(self.stems.capacity());
        self.stems.begin_block(visible);

        for (i, &l) in left.iter().enumerate() {
            pipeline.inputs[0].push(l);
            pipeline.inputs[1].push(right.get(i).copied().unwrap_or(0.0));

            for (stem, pair) in pipeline.outputs.iter_mut().enumerate() {
                let l = pair[0].pop();
                let r = pair[1].pop();
                if i < visible {
                    self.stems.channel_mut(stem, 0)[i] = l;
                    self.stems.channel_mut(stem, 1)[i] = r;
                }
            }

            pipeline.countdown -= 1;
            if pipeline.countdown == 0 {
                pipeline.countdown = pipeline.hop;
                self.faults += pipeline.run_hop(strategy, self.params.snapshot());
            }
        }
    }

    fn stems(&self) -> &StemSet {
        &self.stems
    }

    fn latency_samples(&self) -> usize {
        self.config.fft_size
    }
}
