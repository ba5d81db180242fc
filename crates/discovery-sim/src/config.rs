//! Configuration file support for discovery-sim.
//!
//! Loads `discovery.toml` from the working directory, falling back to the
//! global config at `<config_dir>/discovery-sim/config.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use discovery_core::DEFAULT_MIN_EXCHANGES;
use discovery_gateway::{ClientOptions, ProviderKind};

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "discovery.toml";
/// Directory under the platform config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "discovery-sim";
/// Global config file name
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Settings read from a config file; every field is optional
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// `openai`, `gemini` or `gemini-test`
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub min_exchanges: Option<usize>,
    pub max_retries: Option<u32>,
    /// Whole-request timeout, e.g. `"90s"` or `"2m"`
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Path of the global config file, if the platform has a config dir
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

impl FileConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise the working-directory file is
    /// tried first, then the global one.
    ///
    /// Returns:
    /// - `Ok(Some((config, path)))` if a file was found and parsed
    /// - `Ok(None)` if no file exists
    /// - `Err(...)` if a file exists but fails to parse (hard error)
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        if let Some(path) = explicit {
            return Self::load_from(path).map(|config| Some((config, path.to_path_buf())));
        }

        let candidates = std::iter::once(working_dir.join(CONFIG_FILE_NAME)).chain(global_config_path());
        for path in candidates {
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok(Some((config, path)));
            }
        }

        Ok(None)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Values given on the command line, which win over the file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub min_exchanges: Option<usize>,
}

/// Effective settings after merging command line, file and defaults
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub min_exchanges: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl Settings {
    /// Priority: command line > config file > built-in default
    pub fn resolve(overrides: Overrides, file: Option<&FileConfig>) -> Result<Self> {
        let file_provider = match file.and_then(|f| f.provider.as_deref()) {
            Some(name) => Some(
                name.parse::<ProviderKind>()
                    .map_err(|e| anyhow::anyhow!("Invalid provider in config: {}", e))?,
            ),
            None => None,
        };

        let defaults = ClientOptions::default();

        Ok(Self {
            provider: overrides
                .provider
                .or(file_provider)
                .unwrap_or(ProviderKind::OpenAi),
            model: overrides.model.or_else(|| file.and_then(|f| f.model.clone())),
            base_url: overrides
                .base_url
                .or_else(|| file.and_then(|f| f.base_url.clone())),
            min_exchanges: overrides
                .min_exchanges
                .or_else(|| file.and_then(|f| f.min_exchanges))
                .unwrap_or(DEFAULT_MIN_EXCHANGES),
            request_timeout: file
                .and_then(|f| f.request_timeout)
                .unwrap_or(defaults.timeout),
            max_retries: file
                .and_then(|f| f.max_retries)
                .unwrap_or(defaults.max_retries),
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.request_timeout,
            max_retries: self.max_retries,
            ..ClientOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        // The global file may exist on a developer machine, so only check the local miss
        let result = FileConfig::load(None, dir.path()).unwrap();
        if let Some((_, path)) = result {
            assert_ne!(path, dir.path().join(CONFIG_FILE_NAME));
        }
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
provider = "gemini"
model = "gemini-3-flash-preview"
min_exchanges = 3
max_retries = 4
request_timeout = "90s"
"#,
        )
        .unwrap();

        let (config, path) = FileConfig::load(None, dir.path()).unwrap().unwrap();
        assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.provider.as_deref(), Some("gemini"));
        assert_eq!(config.min_exchanges, Some(3));
        assert_eq!(config.max_retries, Some(4));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "model = \"gpt-5.1\"\n").unwrap();

        let (config, loaded_from) = FileConfig::load(Some(&path), Path::new("/nonexistent"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.model.as_deref(), Some("gpt-5.1"));
    }

    #[test]
    fn test_load_explicit_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let result = FileConfig::load(Some(&dir.path().join("nope.toml")), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "temperature = 0.2\n").unwrap();

        let result = FileConfig::load(None, dir.path());
        assert!(result.is_err());
        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("Failed to parse"));
    }

    #[test]
    fn test_bad_timeout_is_error() {
        let result: std::result::Result<FileConfig, _> = toml::from_str("request_timeout = \"soon\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::resolve(Overrides::default(), None).unwrap();
        assert_eq!(settings.provider, ProviderKind::OpenAi);
        assert_eq!(settings.model, None);
        assert_eq!(settings.min_exchanges, DEFAULT_MIN_EXCHANGES);
        assert_eq!(settings.max_retries, ClientOptions::default().max_retries);
        assert_eq!(settings.client_options().timeout, ClientOptions::default().timeout);
    }

    #[test]
    fn test_command_line_wins_over_file() {
        let file = FileConfig {
            provider: Some("gemini".to_string()),
            model: Some("file-model".to_string()),
            min_exchanges: Some(4),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            provider: Some(ProviderKind::GeminiTest),
            min_exchanges: Some(0),
            ..Overrides::default()
        };

        let settings = Settings::resolve(overrides, Some(&file)).unwrap();
        assert_eq!(settings.provider, ProviderKind::GeminiTest);
        assert_eq!(settings.model.as_deref(), Some("file-model"));
        assert_eq!(settings.min_exchanges, 0);
    }

    #[test]
    fn test_invalid_provider_in_file() {
        let file = FileConfig {
            provider: Some("anthropic".to_string()),
            ..FileConfig::default()
        };
        assert!(Settings::resolve(Overrides::default(), Some(&file)).is_err());
    }
}
