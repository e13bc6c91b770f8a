use thiserror::Error;

/// Errors of the non-real-time entry points (offline separation).
#[derive(Error, Debug)]
pub enum StemsError {
    /// `prepare` was never called on the engine.
    #[error("Moteur non préparé : appeler prepare() avant de séparer")]
    NotPrepared,

    /// Block size larger than the one announced to `prepare`.
    #[error("Bloc de {block} frames > maximum préparé {max}")]
    BlockTooLarge {
        /// Requested block size.
        block: usize,
        /// Block size given to `prepare`.
        max: usize,
    },

    /// Left and right channels differ in length.
    #[error("Canaux de longueurs différentes : {left} vs {right}")]
    ChannelLength {
        /// Left channel length.
        left: usize,
        /// Right channel length.
        right: usize,
    },

    /// Zero-sized block.
    #[error("Taille de bloc nulle")]
    EmptyBlock,
}
