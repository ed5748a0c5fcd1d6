//! Configuration files
//!
//! Descriptor types implement [`Config`] so applications can keep device settings in a
//! `.toml` or `.ron` file next to the executable.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// File-backed configuration
///
/// The format is picked from the file extension. Implementors may override [`Config::check`]
/// to reject values that parse but make no sense.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Validate a freshly loaded value
    fn check(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let value: Self = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            ConfigFormat::Ron => {
                ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };

        value.check()?;
        Ok(value)
    }

    /// Load configuration from file, or use defaults when the file does not exist
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file parsed but holds values that cannot be used
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Config for Sample {
        fn check(&self) -> Result<(), ConfigError> {
            if self.count > 10 {
                return Err(ConfigError::Invalid("count too large".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let result = Sample::default().save_to_file("settings.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_toml_and_ron_files() {
        let dir = tempfile::tempdir().unwrap();
        let sample = Sample { name: "device".to_string(), count: 3 };

        for file in ["sample.toml", "sample.ron"] {
            let path = dir.path().join(file);
            sample.save_to_file(&path).unwrap();
            assert_eq!(Sample::load_from_file(&path).unwrap(), sample);
        }
    }

    #[test]
    fn test_check_rejects_loaded_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = \"x\"\ncount = 42\n").unwrap();

        assert!(matches!(Sample::load_from_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Sample::load_or_default(dir.path().join("absent.ron")).unwrap();
        assert_eq!(loaded, Sample::default());
    }
}
