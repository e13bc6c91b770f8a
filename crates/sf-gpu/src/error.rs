use thiserror::Error;

/// Errors raised while probing or driving the GPU FFT.
#[derive(Error, Debug, Clone)]
pub enum GpuError {
    /// The crate was built without a compute backend.
    #[error("GPU indisponible : {0}")]
    Unsupported(&'static str),

    /// No adapter matched the request.
    #[error("Aucun adaptateur GPU trouvé")]
    NoAdapter,

    /// Only a software rasterizer was found (llvmpipe, WARP…).
    #[error("Adaptateur logiciel ignoré : {0}")]
    SoftwareAdapter(String),

    /// Device creation failed.
    #[error("Échec de création du device : {0}")]
    RequestDevice(String),

    /// Buffer, shader or pipeline creation failed.
    #[error("Échec d'allocation GPU : {0}")]
    Allocation(String),

    /// Buffer readback failed.
    #[error("Échec de lecture GPU : {0}")]
    Map(String),

    /// The probe transform disagreed with the CPU reference.
    #[error("Auto-test FFT échoué : écart {error:.3e} > {tolerance:.1e}")]
    SelfTest {
        /// Largest relative bin error observed.
        error: f32,
        /// Accepted relative error.
        tolerance: f32,
    },

    /// A batch larger than the planned capacity, or mismatched buffers.
    #[error("Batch invalide : {0}")]
    Batch(&'static str),
}
