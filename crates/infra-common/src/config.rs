//! TOML configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{Error, ErrorContext, ErrorExt, Result};

/// Deserialize a configuration value from TOML text
pub fn parse_toml<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}

/// Read and deserialize a TOML configuration file
pub fn load_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let ctx = || ErrorContext::new("config", "load").with_details(path.display().to_string());

    let text = std::fs::read_to_string(path).map_err(|e| Error::from(e).context(ctx()))?;
    debug!("Loaded configuration from {}", path.display());
    parse_toml(&text).map_err(|e| e.context(ctx()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        port: u16,
    }

    #[test]
    fn test_parse_toml() {
        let sample: Sample = parse_toml("name = \"alice\"\nport = 5060").unwrap();
        assert_eq!(sample, Sample { name: "alice".to_string(), port: 5060 });

        let defaulted: Sample = parse_toml("name = \"bob\"").unwrap();
        assert_eq!(defaulted.port, 0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(parse_toml::<Sample>("name = "), Err(Error::Config(_))));
        assert!(matches!(parse_toml::<Sample>("port = 1"), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_toml_file::<Sample>("/nonexistent/voxcall.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("/nonexistent/voxcall.toml"));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("voxcall-config-{}.toml", std::process::id()));
        std::fs::write(&path, "name = \"carol\"\nport = 7000\n").unwrap();
        let sample: Sample = load_toml_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(sample.port, 7000);
    }
}
