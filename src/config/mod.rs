/// Benchdiff configuration
pub mod app;
pub use app::{load_config, BenchstatOptions, ConfigOverrides, DiffConfig, DEFAULT_CONFIG_FILE};

/// Merging traits
pub mod merge;
pub use merge::Merge;

/// Configuration traits
pub mod traits;
pub use traits::{Configuration, PathConfiguration};
