use std::path::Path;

/// Common trait for configuration types
pub trait Configuration {
    /// Returns the file path where this configuration was loaded from, if any
    fn config_path(&self) -> Option<&Path>;

    /// Returns a string identifier for the configuration type
    fn config_type(&self) -> &str;

    /// Validates the configuration
    fn validate(&self) -> anyhow::Result<()>;
}

/// Trait for configurations with path elements that need expansion
pub trait PathConfiguration: Configuration {
    /// Returns a copy with environment variables expanded and relative paths joined to `base_dir`
    fn with_expanded_paths(&self, base_dir: &Path) -> Self
    where
        Self: Sized;
}
