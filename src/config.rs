//! Engine configuration.
//!
//! [`CanonicalOptions`] is plain data with sensible defaults. With the `cli`
//! feature it can also be loaded from a TOML file:
//!
//! ```toml
//! max_flat_params = 16
//! max_flat_results = 1
//! canonicalize_nan = true
//! ```

#[cfg(feature = "cli")]
use std::path::Path;

/// Maximum number of flat parameters passed directly to a core function.
pub const MAX_FLAT_PARAMS: usize = 16;

/// Maximum number of flat results returned directly from a core function.
pub const MAX_FLAT_RESULTS: usize = 1;

/// Options that shape the calling convention and lifting behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct CanonicalOptions {
    /// Flat parameter count above which arguments are passed through memory.
    pub max_flat_params: usize,
    /// Flat result count above which results are written through an out-pointer.
    pub max_flat_results: usize,
    /// Replace every lifted NaN with the canonical quiet NaN.
    pub canonicalize_nan: bool,
}

impl Default for CanonicalOptions {
    fn default() -> Self {
        Self {
            max_flat_params: MAX_FLAT_PARAMS,
            max_flat_results: MAX_FLAT_RESULTS,
            canonicalize_nan: true,
        }
    }
}

#[cfg(feature = "cli")]
impl CanonicalOptions {
    /// Load options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    /// Parse options from a TOML string. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        if options.max_flat_results > MAX_FLAT_RESULTS {
            return Err(ConfigError::Invalid(format!(
                "max_flat_results cannot exceed {}",
                MAX_FLAT_RESULTS
            )));
        }
        Ok(options)
    }
}

/// Configuration error.
#[cfg(feature = "cli")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(all(test, feature = "cli"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
max_flat_params = 8
canonicalize_nan = false
"#;
        let options = CanonicalOptions::from_toml_str(toml).unwrap();
        assert_eq!(options.max_flat_params, 8);
        assert_eq!(options.max_flat_results, MAX_FLAT_RESULTS);
        assert!(!options.canonicalize_nan);
    }

    #[test]
    fn test_empty_config_is_default() {
        let options = CanonicalOptions::from_toml_str("").unwrap();
        assert_eq!(options, CanonicalOptions::default());
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(
            CanonicalOptions::from_toml_str("max_flat = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CanonicalOptions::from_toml_str("max_flat_results = 2"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_flat_params = 4").unwrap();
        let options = CanonicalOptions::from_file(file.path()).unwrap();
        assert_eq!(options.max_flat_params, 4);

        let missing = CanonicalOptions::from_file("/nonexistent/canon.toml");
        assert!(matches!(missing, Err(ConfigError::Io(_, _))));
    }
}
