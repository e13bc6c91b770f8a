use std::sync::atomic::{AtomicU32, Ordering};

/// Bass cutoff range in Hz.
pub const BASS_CUTOFF_RANGE: (f32, f32) = (20.0, 1000.0);
/// Default bass cutoff in Hz.
pub const DEFAULT_BASS_CUTOFF_HZ: f32 = 150.0;
/// Default vocals focus.
pub const DEFAULT_VOCALS_FOCUS: f32 = 0.5;
/// Default drum sensitivity.
pub const DEFAULT_DRUM_SENSITIVITY: f32 = 0.5;

/// Paramètres de séparation partagés entre le thread de contrôle et le thread audio.
///
/// Chaque valeur est un `f32` stocké en bits dans un `AtomicU32` : zero-alloc,
/// zero-lock, `Send + Sync`. Les setters clampent silencieusement et ignorent
/// les valeurs non finies.
///
/// # Example
/// ```
/// use sf_core::params::SeparationParams;
/// let params = SeparationParams::default();
/// params.set_vocals_focus(3.0);
/// assert_eq!(params.vocals_focus(), 1.0);
/// params.set_bass_cutoff(f32::NAN);
/// assert_eq!(params.bass_cutoff_hz(), 150.0);
/// ```
#[derive(Debug)]
pub struct SeparationParams {
    bass_cutoff_hz: AtomicU32,
    vocals_focus: AtomicU32,
    drum_sensitivity: AtomicU32,
}

/// Plain-value copy of the parameters, read once per analysis frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSnapshot {
    pub bass_cutoff_hz: f32,
    pub vocals_focus: f32,
    pub drum_sensitivity: f32,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self {
            bass_cutoff_hz: DEFAULT_BASS_CUTOFF_HZ,
            vocals_focus: DEFAULT_VOCALS_FOCUS,
            drum_sensitivity: DEFAULT_DRUM_SENSITIVITY,
        }
    }
}

impl SeparationParams {
    /// Crée un bloc de paramètres à partir de valeurs initiales (clampées).
    #[must_use]
    pub fn new(bass_cutoff_hz: f32, vocals_focus: f32, drum_sensitivity: f32) -> Self {
        let params = Self {
            bass_cutoff_hz: AtomicU32::new(DEFAULT_BASS_CUTOFF_HZ.to_bits()),
            vocals_focus: AtomicU32::new(DEFAULT_VOCALS_FOCUS.to_bits()),
            drum_sensitivity: AtomicU32::new(DEFAULT_DRUM_SENSITIVITY.to_bits()),
        };
        params.set_bass_cutoff(bass_cutoff_hz);
        params.set_vocals_focus(vocals_focus);
        params.set_drum_sensitivity(drum_sensitivity);
        params
    }

    /// Fréquence de coupure de la basse, en Hz.
    #[inline]
    #[must_use]
    pub fn bass_cutoff_hz(&self) -> f32 {
        f32::from_bits(self.bass_cutoff_hz.load(Ordering::Relaxed))
    }

    /// Focus vocal [0, 1] : 1 = estimateur centre pur, 0 = pondération neutre.
    #[inline]
    #[must_use]
    pub fn vocals_focus(&self) -> f32 {
        f32::from_bits(self.vocals_focus.load(Ordering::Relaxed))
    }

    /// Sensibilité aux transitoires [0, 1].
    #[inline]
    #[must_use]
    pub fn drum_sensitivity(&self) -> f32 {
        f32::from_bits(self.drum_sensitivity.load(Ordering::Relaxed))
    }

    /// Met à jour la coupure basse, clampée à [20, 1000] Hz.
    #[inline]
    pub fn set_bass_cutoff(&self, hz: f32) {
        store_clamped(&self.bass_cutoff_hz, hz, BASS_CUTOFF_RANGE.0, BASS_CUTOFF_RANGE.1);
    }

    /// Met à jour le focus vocal, clampé à [0, 1].
    #[inline]
    pub fn set_vocals_focus(&self, focus: f32) {
        store_clamped(&self.vocals_focus, focus, 0.0, 1.0);
    }

    /// Met à jour la sensibilité batterie, clampée à [0, 1].
    #[inline]
    pub fn set_drum_sensitivity(&self, sensitivity: f32) {
        store_clamped(&self.drum_sensitivity, sensitivity, 0.0, 1.0);
    }

    /// Copie les trois valeurs courantes.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            bass_cutoff_hz: self.bass_cutoff_hz(),
            vocals_focus: self.vocals_focus(),
            drum_sensitivity: self.drum_sensitivity(),
        }
    }

    /// Applique un snapshot complet (rechargement de config).
    pub fn apply(&self, snapshot: ParamSnapshot) {
        self.set_bass_cutoff(snapshot.bass_cutoff_hz);
        self.set_vocals_focus(snapshot.vocals_focus);
        self.set_drum_sensitivity(snapshot.drum_sensitivity);
    }
}

impl Default for SeparationParams {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASS_CUTOFF_HZ,
            DEFAULT_VOCALS_FOCUS,
            DEFAULT_DRUM_SENSITIVITY,
        )
    }
}

#[inline(always)]
fn store_clamped(slot: &AtomicU32, value: f32, lo: f32, hi: f32) {
    if value.is_finite() {
        slot.store(value.clamp(lo, hi).to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn setters_clamp_to_ranges() {
        let params = SeparationParams::default();
        params.set_bass_cutoff(5.0);
        assert_eq!(params.bass_cutoff_hz(), 20.0);
        params.set_bass_cutoff(50_000.0);
        assert_eq!(params.bass_cutoff_hz(), 1000.0);
        params.set_drum_sensitivity(-1.0);
        assert_eq!(params.drum_sensitivity(), 0.0);
        params.set_vocals_focus(0.25);
        assert_eq!(params.vocals_focus(), 0.25);
    }

    #[test]
    fn non_finite_writes_are_ignored() {
        let params = SeparationParams::new(200.0, 0.7, 0.3);
        params.set_vocals_focus(f32::INFINITY);
        params.set_drum_sensitivity(f32::NAN);
        assert_eq!(params.vocals_focus(), 0.7);
        assert_eq!(params.drum_sensitivity(), 0.3);
    }

    #[test]
    fn writes_from_another_thread_are_visible() {
        let params = Arc::new(SeparationParams::default());
        let writer = Arc::clone(&params);
        let handle = std::thread::spawn(move || writer.set_bass_cutoff(300.0));
        assert!(handle.join().is_ok());
        assert_eq!(params.snapshot().bass_cutoff_hz, 300.0);
    }
}
