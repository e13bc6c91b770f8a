use thiserror::Error;

/// Errors originating from the audio module.
///
/// Variants raised on the real-time path carry no heap data.
#[derive(Error, Debug)]
pub enum AudioError {
    /// A buffer handed to a transform has the wrong length.
    #[error("Longueur de buffer invalide : attendu {expected}, reçu {got}")]
    BufferLength {
        /// Length the transform was planned for.
        expected: usize,
        /// Length it received.
        got: usize,
    },

    /// The FFT itself reported a failure.
    #[error("Échec de la transformée : {0}")]
    Transform(&'static str),

    /// FFT size is not a power of two, or zero.
    #[error("Taille FFT invalide : {0}")]
    InvalidFftSize(usize),

    /// Unsupported audio format.
    #[error("Format audio non supporté : {0}")]
    UnsupportedFormat(String),

    /// Audio decode error.
    #[error("Erreur de décodage : {0}")]
    DecodeError(String),
}
