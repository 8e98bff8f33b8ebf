use std::path::PathBuf;

/// Result type alias for suite-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for suite-runner.
///
/// These are run-level failures: bad configuration, unreadable manifests,
/// listener or report writer problems. Failures of individual tests are never
/// represented here; they are classified into an [`Outcome`](crate::result::Outcome).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid name or group filter.
    #[error("Filter error: {0}")]
    Filter(String),

    /// A listener failed while handling an event.
    #[error("Listener error: {0}")]
    Listener(String),

    /// Coverage report generation errors.
    #[error("Report error: {0}")]
    Report(String),

    /// Coverage driver errors.
    #[error("Coverage error: {0}")]
    Coverage(String),

    /// Test manifest loading errors.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidConfig { field: String, value: String },

    /// Feature not enabled.
    #[error("Feature '{0}' is not enabled. Enable it in Cargo.toml features.")]
    FeatureNotEnabled(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cargo metadata error.
    #[cfg(feature = "cargo-metadata")]
    #[error("Cargo metadata error: {0}")]
    CargoMetadata(#[from] cargo_metadata::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a filter error.
    pub fn filter(msg: impl Into<String>) -> Self {
        Error::Filter(msg.into())
    }

    /// Create a listener error.
    pub fn listener(msg: impl Into<String>) -> Self {
        Error::Listener(msg.into())
    }

    /// Create a report error.
    pub fn report(msg: impl Into<String>) -> Self {
        Error::Report(msg.into())
    }

    /// Create a coverage error.
    pub fn coverage(msg: impl Into<String>) -> Self {
        Error::Coverage(msg.into())
    }

    /// Create a manifest error.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Error::Manifest(msg.into())
    }

    /// Create an invalid configuration value error.
    pub fn invalid_config(field: impl Into<String>, value: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a feature not enabled error.
    pub fn feature_not_enabled(feature: impl Into<String>) -> Self {
        Error::FeatureNotEnabled(feature.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        assert_eq!(
            Error::config("bad value").to_string(),
            "Configuration error: bad value"
        );
        assert_eq!(
            Error::filter("unbalanced group").to_string(),
            "Filter error: unbalanced group"
        );
        assert_eq!(
            Error::listener("disk full").to_string(),
            "Listener error: disk full"
        );
        assert_eq!(
            Error::report("no writer").to_string(),
            "Report error: no writer"
        );
        assert_eq!(
            Error::coverage("driver gone").to_string(),
            "Coverage error: driver gone"
        );
        assert_eq!(
            Error::manifest("no suites").to_string(),
            "Manifest error: no suites"
        );
        assert_eq!(
            Error::feature_not_enabled("cargo-metadata").to_string(),
            "Feature 'cargo-metadata' is not enabled. Enable it in Cargo.toml features."
        );
    }

    #[test]
    fn test_error_file_not_found() {
        let err = Error::FileNotFound(PathBuf::from("/missing/tests.toml"));
        assert_eq!(err.to_string(), "File not found: /missing/tests.toml");
    }

    #[test]
    fn test_error_invalid_config() {
        let err = Error::invalid_config("console.colors", "sometimes");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for console.colors: sometimes"
        );
    }
}
