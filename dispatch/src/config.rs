//! Application-level settings.
//!
//! Built in code or loaded from a YAML file, for example:
//!
//! ```yaml
//! name: tool
//! about: Maintenance commands
//! version: "1.2.0"
//! quiet: true
//! ```

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Settings shared by every command of an application.
///
/// # Examples
///
/// ```
/// use autocli_dispatch::AppConfig;
///
/// let config = AppConfig::from_yaml_str("name: tool\nquiet: true\n").unwrap();
/// assert_eq!(config.name, "tool");
/// assert!(config.quiet);
/// assert_eq!(config.version, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Program name shown in usage lines and help.
    pub name: String,
    /// One-line description shown at the top of the global help.
    pub about: Option<String>,
    /// Version string shown in the global help.
    pub version: Option<String>,
    /// Suppresses the `Starting`/`Done` banners around each invocation.
    pub quiet: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new("app")
    }
}

impl AppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            version: None,
            quiet: false,
        }
    }

    /// Loads settings from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// or [`YamlError`](ConfigError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Parses settings from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
