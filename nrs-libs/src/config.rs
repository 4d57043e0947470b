//! Configuration for NRS.gui.
//!
//! The GUI reads an optional `nrsgui.yaml`. Every section has defaults, so an
//! empty file (or no file at all) yields a working configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! server:
//!   host: "127.0.0.1"
//!   port: 3000
//! names:
//!   max_length: 64
//!   allow_spaces: false
//! settings:
//!   online_offline: true
//! ```

use crate::constants::{self, settings};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuiConfig {
    /// Where the editor API listens
    #[serde(default)]
    pub server: ServerConfig,

    /// Rules applied to proposed node names
    #[serde(default)]
    pub names: NameRules,

    /// Initial GUI settings (online/offline flag and friends)
    #[serde(default)]
    pub settings: Settings,
}

/// Listen address of the editor API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: constants::DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Syntactic rules for node names.
///
/// Also the default [`ValidateNodeName`](crate::validate::ValidateNodeName)
/// implementation; see `validate.rs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameRules {
    /// Maximum name length in characters
    pub max_length: usize,

    /// Whether inner spaces are allowed ("Left Motor")
    pub allow_spaces: bool,
}

impl Default for NameRules {
    fn default() -> Self {
        Self {
            max_length: 64,
            allow_spaces: false,
        }
    }
}

/// String-keyed GUI settings.
///
/// Values are untyped JSON; the well-known keys live in
/// [`constants::settings`](crate::constants::settings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Store `value` under `key`, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Online/offline flag. A missing or non-boolean value means offline.
    pub fn is_online(&self) -> bool {
        self.get(settings::ONLINE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_online(&mut self, online: bool) {
        self.set(settings::ONLINE, Value::Bool(online));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl GuiConfig {
    /// Resolve the configuration from the process environment.
    ///
    /// `NRSGUI_CONFIG` names the file to load; without it `./nrsgui.yaml` is
    /// used when present, otherwise defaults. `PORT` overrides the port.
    pub fn from_env() -> Result<Self, AppError> {
        let explicit = std::env::var_os(constants::CONFIG_ENV).map(PathBuf::from);
        let port = std::env::var("PORT").ok();
        Self::resolve(explicit, Path::new(constants::DEFAULT_CONFIG_PATH), port.as_deref())
    }

    /// Environment-independent part of [`GuiConfig::from_env`].
    ///
    /// An explicit path must exist; the fallback path is optional.
    pub fn resolve(
        explicit: Option<PathBuf>,
        fallback: &Path,
        port_override: Option<&str>,
    ) -> Result<Self, AppError> {
        let mut config = match explicit {
            Some(path) => load_config(path)?,
            None if fallback.exists() => load_config(fallback)?,
            None => GuiConfig::default(),
        };

        if let Some(port) = port_override {
            config.server.port = port
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid PORT '{}': {}", port, e)))?;
            config.validate()?;
        }

        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.server.port == 0 {
            return Err(AppError::ConfigError("server.port cannot be 0".to_string()));
        }

        if self.names.max_length == 0 {
            return Err(AppError::ConfigError(
                "names.max_length cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load and parse a GUI configuration from a YAML file.
///
/// # Returns
///
/// * `Ok(GuiConfig)` - Successfully parsed and validated configuration
/// * `Err(AppError)` - Failed to read the file, parse the YAML or validate it
///
/// # Example
///
/// ```rust,ignore
/// use nrs_libs::load_config;
///
/// let config = load_config("./nrsgui.yaml")?;
/// println!("Listening on {}", config.server.addr());
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<GuiConfig, AppError> {
    let path = config_path.as_ref();

    let contents = fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("Failed to read config file at {:?}: {}", path, e))
    })?;

    // An empty document deserializes to null, treat it like `{}`
    let config: GuiConfig = if contents.trim().is_empty() {
        GuiConfig::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::ConfigError(format!("Failed to parse config YAML at {:?}: {}", path, e))
        })?
    };

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = GuiConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.addr(), "127.0.0.1:3000");
        assert_eq!(config.names.max_length, 64);
        assert!(!config.settings.is_online());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            "server:\n  host: \"0.0.0.0\"\n  port: 4100\nnames:\n  max_length: 12\n  allow_spaces: true\nsettings:\n  online_offline: true\n  theme: dark\n",
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:4100");
        assert_eq!(config.names.max_length, 12);
        assert!(config.names.allow_spaces);
        assert!(config.settings.is_online());
        assert_eq!(config.settings.get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let file = write_config("names:\n  allow_spaces: true\n");

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.names.max_length, 64);
        assert!(config.names.allow_spaces);
    }

    #[test]
    fn test_load_empty_file() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_rejects_zero_port() {
        let file = write_config("server:\n  port: 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_invalid_yaml() {
        let file = write_config("server: [unclosed\n");
        assert!(matches!(
            load_config(file.path()),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_config(dir.path().join("nope.yaml"));
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_resolve_without_files_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GuiConfig::resolve(None, &dir.path().join("nrsgui.yaml"), None).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_resolve_fallback_and_port_override() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("nrsgui.yaml");
        fs::write(&fallback, "server:\n  port: 4000\n").unwrap();

        let config = GuiConfig::resolve(None, &fallback, None).unwrap();
        assert_eq!(config.server.port, 4000);

        let config = GuiConfig::resolve(None, &fallback, Some("5005")).unwrap();
        assert_eq!(config.server.port, 5005);

        assert!(GuiConfig::resolve(None, &fallback, Some("not-a-port")).is_err());
    }

    #[test]
    fn test_resolve_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = GuiConfig::resolve(
            Some(dir.path().join("missing.yaml")),
            &dir.path().join("nrsgui.yaml"),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_online_flag() {
        let mut prefs = Settings::new();
        assert!(!prefs.is_online());

        prefs.set_online(true);
        assert!(prefs.is_online());
        assert_eq!(prefs.get(settings::ONLINE), Some(&Value::Bool(true)));

        // Non-boolean values read as offline
        prefs.set(settings::ONLINE, Value::from("yes"));
        assert!(!prefs.is_online());
    }
}
