// Real-time spectral stem separation.
//
// Leaf to root: `analyzer` (windowed FFT of the input rings), `masks`
// (per-bin stem gains), `synth` (masked inverse FFT + overlap-add), `engine`
// (the streaming driver), plus `mixer` and whole-file `offline` helpers.

pub mod analyzer;
pub mod backend;
pub mod engine;
pub mod error;
pub mod masks;
pub mod mixer;
pub mod offline;
pub mod synth;

pub use engine::StemEngine;
pub use error::StemsError;
pub use mixer::StemMixer;
pub use offline::{separate_buffer, separate_track, StemTrack, StemTracks};
