use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Unknown stem name (CLI, config).
    #[error("Stem inconnu : {name}")]
    UnknownStem {
        /// The name that did not match any stem.
        name: String,
    },

    /// Stem not present in the active layout.
    #[error("Stem {stem} absent du layout {layout}")]
    StemNotInLayout {
        /// Requested stem name.
        stem: &'static str,
        /// Layout name.
        layout: &'static str,
    },
}
