use crate::stem::StemSet;

/// Sépare un flux audio multicanal en stems, bloc par bloc.
///
/// Implémenté par : `StemEngine` (sf-stems).
///
/// # Example
/// ```
/// use sf_core::stem::{StemLayout, StemSet};
/// use sf_core::traits::StemSeparator;
///
/// struct Passthrough { stems: StemSet }
/// impl StemSeparator for Passthrough {
///     fn prepare(&mut self, _sample_rate: f64, max_block_size: usize) {
///         self.stems = StemSet::new(StemLayout::Four, max_block_size);
///     }
///     fn reset(&mut self) { self.stems.clear(); }
///     fn process(&mut self, block: &[&[f32]]) {
///         let frames = block.first().map_or(0, |c| c.len());
///         self.stems.begin_block(frames);
///     }
///     fn stems(&self) -> &StemSet { &self.stems }
///     fn latency_samples(&self) -> usize { 0 }
/// }
/// ```
pub trait StemSeparator: Send {
    /// Alloue et réinitialise tout l'état interne. Doit précéder `process`.
    ///
    /// Ré-entrant : rappeler `prepare` change le sample rate ou la taille de bloc.
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize);

    /// Remet à zéro buffers et historique sans réallouer.
    fn reset(&mut self);

    /// Consomme un bloc (un slice par canal) et remplit les stems.
    ///
    /// CONTRAT : ne doit PAS allouer, bloquer, ni paniquer.
    fn process(&mut self, block: &[&[f32]]);

    /// Stems du dernier bloc, valides jusqu'au prochain `process`.
    fn stems(&self) -> &StemSet;

    /// Délai entrée → stems, en samples.
    fn latency_samples(&self) -> usize;
}
