// Signal plumbing for stemforge: ring buffers, windowing, FFT backends, file I/O.

pub mod decode;
pub mod error;
pub mod fft;
pub mod ring;
pub mod wav;
pub mod window;

pub use error::AudioError;
pub use fft::{Complex32, CpuBackend, FftBackend};
pub use ring::RingBuffer;
