//! Streaming separator benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sf_audio::fft::{CpuBackend, FftBackend};
use sf_audio::ring::RingBuffer;
use sf_core::config::{BackendPreference, SeparatorConfig};
use sf_core::stem::StemLayout;
use sf_core::traits::StemSeparator;
use sf_stems::analyzer::WindowedFftAnalyzer;
use sf_stems::masks::MaskComputer;
use sf_stems::StemEngine;

const RATE: f64 = 44_100.0;

fn signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            0.3 * (std::f32::consts::TAU * 110.0 * t).sin()
                + 0.2 * (std::f32::consts::TAU * 1320.0 * t).sin()
        })
        .collect()
}

fn bench_process_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_block");
    for layout in [StemLayout::Four, StemLayout::Six] {
        let mut engine = StemEngine::new(SeparatorConfig {
            layout,
            backend: BackendPreference::Cpu,
            ..SeparatorConfig::default()
        });
        engine.prepare(RATE, 512);
        let input = signal(512);

        group.bench_with_input(BenchmarkId::from_parameter(layout.name()), &input, |b, input| {
            b.iter(|| {
                engine.process(black_box(&[input.as_slice(), input.as_slice()]));
            });
        });
    }
    group.finish();
}

fn bench_analysis_and_masks(c: &mut Criterion) {
    let fft_size = 2048;
    let mut fft = match CpuBackend::new(fft_size) {
        Ok(fft) => fft,
        Err(e) => panic!("CPU FFT: {e}"),
    };
    let mut analyzer = WindowedFftAnalyzer::new(fft_size);
    let mut masks = MaskComputer::new(StemLayout::Six, fft_size, RATE as f32);
    let params = SeparatorConfig::default().param_snapshot();

    let mut left = RingBuffer::new(fft_size);
    let mut right = RingBuffer::new(fft_size);
    for (i, s) in signal(fft_size).into_iter().enumerate() {
        left.push(s);
        right.push(if i % 2 == 0 { s } else { -s });
    }

    c.bench_function("analyze_2048", |b| {
        b.iter(|| {
            let _ = analyzer.analyze(&mut fft as &mut dyn FftBackend, &left, &right);
        });
    });
    c.bench_function("masks_six_2048", |b| {
        b.iter(|| masks.compute(black_box(analyzer.spectrum()), params));
    });
}

criterion_group!(benches, bench_process_block, bench_analysis_and_masks);
criterion_main!(benches);
