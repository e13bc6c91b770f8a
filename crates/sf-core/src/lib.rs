/// Shared types, parameters, and configuration for stemforge.
///
/// This crate contains the stem vocabulary, the lock-free parameter block
/// and the TOML configuration used across the stemforge workspace.

pub mod config;
pub mod error;
pub mod params;
pub mod stem;
pub mod traits;

pub use config::SeparatorConfig;
pub use error::CoreError;
pub use params::SeparationParams;
pub use stem::{Stem, StemLayout, StemSet};
pub use traits::StemSeparator;
