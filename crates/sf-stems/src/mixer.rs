use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use sf_core::stem::{Stem, StemSet};

/// Largest per-stem gain.
pub const MAX_GAIN: f32 = 2.0;

const STEMS: usize = Stem::ALL.len();

/// Stem mix-down with per-stem gain, mute and solo.
///
/// Every control is an atomic, so a UI or control thread can write while the
/// audio thread mixes. If any stem is soloed only soloed stems are heard;
/// otherwise every un-muted stem is. Peak levels of the last mixed block are
/// published per stem for metering.
///
/// # Example
/// ```
/// use sf_core::stem::{Stem, StemLayout, StemSet};
/// use sf_stems::mixer::StemMixer;
///
/// let mixer = StemMixer::new();
/// mixer.set_solo(Stem::Vocals, true);
/// assert!(mixer.is_audible(Stem::Vocals));
/// assert!(!mixer.is_audible(Stem::Drums));
///
/// let mut stems = StemSet::new(StemLayout::Four, 4);
/// stems.begin_block(4);
/// let (mut left, mut right) = ([0.0; 4], [0.0; 4]);
/// mixer.mix_into(&stems, &mut left, &mut right);
/// ```
#[derive(Debug)]
pub struct StemMixer {
    gains: [AtomicU32; STEMS],
    muted: [AtomicBool; STEMS],
    soloed: [AtomicBool; STEMS],
    levels: [AtomicU32; STEMS],
}

impl Default for StemMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl StemMixer {
    /// Unity gain, nothing muted or soloed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gains: std::array::from_fn(|_| AtomicU32::new(1.0f32.to_bits())),
            muted: std::array::from_fn(|_| AtomicBool::new(false)),
            soloed: std::array::from_fn(|_| AtomicBool::new(false)),
            levels: std::array::from_fn(|_| AtomicU32::new(0.0f32.to_bits())),
        }
    }

    /// Gain of `stem`.
    #[must_use]
    pub fn gain(&self, stem: Stem) -> f32 {
        f32::from_bits(self.gains[stem as usize].load(Ordering::Relaxed))
    }

    /// Set the gain of `stem`, clamped to `[0, MAX_GAIN]`. Non-finite values are ignored.
    pub fn set_gain(&self, stem: Stem, gain: f32) {
        if gain.is_finite() {
            self.gains[stem as usize].store(gain.clamp(0.0, MAX_GAIN).to_bits(), Ordering::Relaxed);
        }
    }

    /// Mute or unmute `stem`.
    pub fn set_mute(&self, stem: Stem, muted: bool) {
        self.muted[stem as usize].store(muted, Ordering::Relaxed);
    }

    /// Solo or unsolo `stem`.
    pub fn set_solo(&self, stem: Stem, soloed: bool) {
        self.soloed[stem as usize].store(soloed, Ordering::Relaxed);
    }

    /// `true` if `stem` is muted.
    #[must_use]
    pub fn is_muted(&self, stem: Stem) -> bool {
        self.muted[stem as usize].load(Ordering::Relaxed)
    }

    /// `true` if `stem` is soloed.
    #[must_use]
    pub fn is_soloed(&self, stem: Stem) -> bool {
        self.soloed[stem as usize].load(Ordering::Relaxed)
    }

    /// `true` if `stem` would be heard in the next mix.
    #[must_use]
    pub fn is_audible(&self, stem: Stem) -> bool {
        if self.any_solo() {
            self.is_soloed(stem)
        } else {
            !self.is_muted(stem)
        }
    }

    fn any_solo(&self) -> bool {
        self.soloed.iter().any(|s| s.load(Ordering::Relaxed))
    }

    /// Peak of `stem` × gain over the last mixed block, heard or not.
    #[must_use]
    pub fn level(&self, stem: Stem) -> f32 {
        f32::from_bits(self.levels[stem as usize].load(Ordering::Relaxed))
    }

    /// Peak levels of every stem, indexed like [`Stem::ALL`].
    #[must_use]
    pub fn levels(&self) -> [f32; STEMS] {
        std::array::from_fn(|i| f32::from_bits(self.levels[i].load(Ordering::Relaxed)))
    }

    /// Overwrite `left`/`right` with the audible stems, each scaled by its gain.
    ///
    /// Mixes `min(stems.len(), left.len(), right.len())` frames; the rest of
    /// the output is zeroed. Never allocates.
    pub fn mix_into(&self, stems: &StemSet, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        let frames = stems.len().min(left.len()).min(right.len());
        let solo = self.any_solo();

        for (stem, l, r) in stems.iter() {
            let idx = stem as usize;
            let gain = self.gain(stem);
            let peak = l[..frames]
                .iter()
                .chain(&r[..frames])
                .fold(0.0f32, |acc, &s| acc.max(s.abs()));
            self.levels[idx].store((peak * gain).to_bits(), Ordering::Relaxed);

            let audible = if solo {
                self.is_soloed(stem)
            } else {
                !self.is_muted(stem)
            };
            if !audible || gain == 0.0 {
                continue;
            }
            for (out, &s) in left[..frames].iter_mut().zip(&l[..frames]) {
                *out += s * gain;
            }
            for (out, &s) in right[..frames].iter_mut().zip(&r[..frames]) {
                *out += s * gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::stem::StemLayout;

    fn filled_set() -> StemSet {
        let mut stems = StemSet::new(StemLayout::Four, 8);
        stems.begin_block(8);
        for (i, &stem) in StemLayout::Four.stems().iter().enumerate() {
            let value = (stem as usize + 1) as f32 * 0.1;
            stems.channel_mut(i, 0).fill(value);
            stems.channel_mut(i, 1).fill(-value);
        }
        stems
    }

    #[test]
    fn unity_mix_sums_every_stem() {
        let mixer = StemMixer::new();
        let stems = filled_set();
        let (mut left, mut right) = ([9.0; 8], [9.0; 8]);
        mixer.mix_into(&stems, &mut left, &mut right);
        assert!(left.iter().all(|&s| (s - 1.0).abs() < 1e-6));
        assert!(right.iter().all(|&s| (s + 1.0).abs() < 1e-6));
    }

    #[test]
    fn solo_overrides_mute() {
        let mixer = StemMixer::new();
        mixer.set_mute(Stem::Bass, true);
        mixer.set_solo(Stem::Bass, true);
        mixer.set_solo(Stem::Drums, true);
        let stems = filled_set();
        let (mut left, mut right) = ([0.0; 8], [0.0; 8]);
        mixer.mix_into(&stems, &mut left, &mut right);
        // drums 0.2 + bass 0.3
        assert!((left[0] - 0.5).abs() < 1e-6);

        mixer.set_solo(Stem::Bass, false);
        mixer.set_solo(Stem::Drums, false);
        mixer.mix_into(&stems, &mut left, &mut right);
        // vocals 0.1 + drums 0.2 + other 0.4, bass muted
        assert!((left[0] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn gain_is_clamped_and_scales_levels() {
        let mixer = StemMixer::new();
        mixer.set_gain(Stem::Other, 7.0);
        mixer.set_gain(Stem::Vocals, f32::NAN);
        assert_eq!(mixer.gain(Stem::Other), MAX_GAIN);
        assert_eq!(mixer.gain(Stem::Vocals), 1.0);

        mixer.set_mute(Stem::Other, true);
        let stems = filled_set();
        let (mut left, mut right) = ([0.0; 8], [0.0; 8]);
        mixer.mix_into(&stems, &mut left, &mut right);
        assert!((mixer.level(Stem::Other) - 0.8).abs() < 1e-6);
        assert!((mixer.levels()[Stem::Drums as usize] - 0.2).abs() < 1e-6);
        assert_eq!(mixer.level(Stem::Piano), 0.0);
    }

    #[test]
    fn short_output_only_takes_what_fits() {
        let mixer = StemMixer::new();
        let stems = filled_set();
        let (mut left, mut right) = ([0.0; 3], [0.0; 5]);
        mixer.mix_into(&stems, &mut left, &mut right);
        assert!((left[2] - 1.0).abs() < 1e-6);
        assert_eq!(right[4], 0.0);
    }
}
