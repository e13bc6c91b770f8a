/// Periodic Hann window of length `size`.
///
/// The periodic form (denominator `size`, not `size - 1`) is the one whose
/// squared, hop-shifted copies sum to a constant at 75 % overlap, which the
/// overlap-add resynthesis relies on.
///
/// # Example
/// ```
/// use sf_audio::window::hann;
/// let w = hann(8);
/// assert_eq!(w[0], 0.0);
/// assert!((w[4] - 1.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn hann(size: usize) -> Vec<f32> {
    let n = size as f64;
    (0..size)
        .map(|i| (0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n).cos())) as f32)
        .collect()
}

/// Overlap gain of analysis × synthesis windowing: `Σ w[n]² / hop`.
///
/// For a window that satisfies COLA on `w²` at this hop, every output sample
/// receives exactly this gain from the overlapping frames (1.5 for periodic
/// Hann at a quarter-frame hop). Dividing by it restores unit amplitude.
///
/// # Example
/// ```
/// use sf_audio::window::{hann, overlap_gain};
/// let gain = overlap_gain(&hann(2048), 512);
/// assert!((gain - 1.5).abs() < 1e-4);
/// ```
#[must_use]
pub fn overlap_gain(window: &[f32], hop: usize) -> f32 {
    if hop == 0 {
        return 1.0;
    }
    let energy: f64 = window.iter().map(|&w| f64::from(w) * f64::from(w)).sum();
    (energy / hop as f64) as f32
}
