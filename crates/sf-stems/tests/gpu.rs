//! GPU and CPU transforms must agree. Skipped at runtime when no adapter is
//! available or the crate is built without the `gpu` feature.

use sf_audio::fft::{Complex32, CpuBackend, FftBackend};
use sf_core::config::{BackendPreference, SeparatorConfig};
use sf_core::traits::StemSeparator;
use sf_gpu::{GpuBackend, GpuOptions};
use sf_stems::StemEngine;

const FFT_SIZE: usize = 2048;

fn software_ok() -> GpuOptions {
    GpuOptions {
        allow_software: true,
        ..GpuOptions::default()
    }
}

fn test_signal(seed: usize) -> Vec<f32> {
    (0..FFT_SIZE)
        .map(|i| {
            let t = i as f32 / FFT_SIZE as f32;
            (std::f32::consts::TAU * (3 + seed) as f32 * t).sin()
                + 0.3 * ((i * 31 + seed * 17) % 53) as f32 / 53.0
        })
        .collect()
}

fn ready_gpu() -> Option<GpuBackend> {
    let gpu = GpuBackend::probed(FFT_SIZE, software_ok());
    if gpu.is_ready() {
        Some(gpu)
    } else {
        eprintln!("skipping: {}", gpu.info());
        None
    }
}

#[test]
fn forward_batch_matches_realfft() -> Result<(), sf_audio::AudioError> {
    let Some(mut gpu) = ready_gpu() else {
        return Ok(());
    };
    let mut cpu = CpuBackend::new(FFT_SIZE)?;
    let bins = cpu.num_bins();

    let (left, right) = (test_signal(1), test_signal(2));
    let mut gpu_l = vec![Complex32::new(0.0, 0.0); bins];
    let mut gpu_r = gpu_l.clone();
    gpu.forward_batch(&mut left.clone(), &mut right.clone(), &mut gpu_l, &mut gpu_r)?;

    let mut cpu_l = gpu_l.clone();
    let mut cpu_r = gpu_l.clone();
    cpu.forward(&mut left.clone(), &mut cpu_l)?;
    cpu.forward(&mut right.clone(), &mut cpu_r)?;

    for (gpu_bins, cpu_bins) in [(&gpu_l, &cpu_l), (&gpu_r, &cpu_r)] {
        let peak = cpu_bins.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
        let worst = gpu_bins
            .iter()
            .zip(cpu_bins.iter())
            .map(|(g, c)| (g - c).norm())
            .fold(0.0f32, f32::max);
        assert!(worst <= 1e-4 * peak, "worst {worst} vs peak {peak}");
    }
    Ok(())
}

#[test]
fn inverse_batch_matches_realfft_beyond_one_submission() -> Result<(), sf_audio::AudioError> {
    let Some(mut gpu) = ready_gpu() else {
        return Ok(());
    };
    let mut cpu = CpuBackend::new(FFT_SIZE)?;
    let bins = cpu.num_bins();
    // More frames than one submission holds.
    let count = sf_gpu::DEFAULT_MAX_BATCH + 3;

    let mut spectra = vec![Complex32::new(0.0, 0.0); count * bins];
    for (k, chunk) in spectra.chunks_mut(bins).enumerate() {
        cpu.forward(&mut test_signal(k), chunk)?;
    }
    let mut expected = vec![0.0f32; count * FFT_SIZE];
    cpu.inverse_batch(&mut spectra.clone(), &mut expected)?;
    let mut actual = vec![0.0f32; count * FFT_SIZE];
    gpu.inverse_batch(&mut spectra, &mut actual)?;

    let peak = expected.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let worst = actual
        .iter()
        .zip(&expected)
        .fold(0.0f32, |m, (a, e)| m.max((a - e).abs()));
    assert!(worst <= 1e-4 * peak, "worst {worst} vs peak {peak}");
    Ok(())
}

#[test]
fn gpu_engine_matches_cpu_engine() {
    if ready_gpu().is_none() {
        return;
    }
    let run = |backend: BackendPreference| {
        let mut engine = StemEngine::new(SeparatorConfig {
            backend,
            ..SeparatorConfig::default()
        })
        .with_gpu_options(software_ok());
        engine.prepare(44_100.0, 512);
        let input: Vec<f32> = (0..8).flat_map(|k| test_signal(k)[..512].to_vec()).collect();
        let mut out = Vec::new();
        for block in input.chunks(512) {
            engine.process(&[block, block]);
            for (_, l, _) in engine.stems().iter() {
                out.extend_from_slice(l);
            }
        }
        (engine.is_using_gpu(), out)
    };

    let (on_gpu, gpu_out) = run(BackendPreference::Gpu);
    let (_, cpu_out) = run(BackendPreference::Cpu);
    if !on_gpu {
        eprintln!("skipping: engine fell back to CPU");
        return;
    }
    let worst = gpu_out
        .iter()
        .zip(&cpu_out)
        .fold(0.0f32, |m, (g, c)| m.max((g - c).abs()));
    assert!(worst < 1e-3, "GPU and CPU engines diverge by {worst}");
}
