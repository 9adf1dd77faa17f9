//! Configuration management for the CLI
//!
//! Settings come from, in increasing precedence:
//! - Default values
//! - A configuration file (YAML/JSON)
//! - Environment variables (`OVH_*`, optionally via `.env`)
//!
//! Credentials are only ever read from the environment. The file format
//! rejects unknown keys so a secret pasted into it fails loudly.

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use ovhgate_core::config as core_config;
use ovhgate_core::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Non-secret gateway settings
    pub gateway: GatewaySettings,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: Option<LoggingConfig>,
}

/// Gateway settings that may live in a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettings {
    /// Named endpoint: ovh-eu, ovh-ca or ovh-us
    pub endpoint: Option<String>,
    /// API root override
    pub base_url: Option<String>,
    /// OAuth2 token endpoint override
    pub token_url: Option<String>,
    /// signed, oauth2 or bearer
    pub auth_method: Option<String>,
    pub oauth2_scope: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Use colored output by default
    pub color: bool,

    /// Show progress indicators
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            progress: true,
        }
    }
}

impl GatewaySettings {
    /// Value of the environment key this setting corresponds to
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            core_config::ENV_ENDPOINT => self.endpoint.clone(),
            core_config::ENV_BASE_URL => self.base_url.clone(),
            core_config::ENV_TOKEN_URL => self.token_url.clone(),
            core_config::ENV_AUTH_METHOD => self.auth_method.clone(),
            core_config::ENV_OAUTH2_SCOPE => self.oauth2_scope.clone(),
            core_config::ENV_REQUEST_TIMEOUT_MS => self.timeout_ms.map(|v| v.to_string()),
            core_config::ENV_MAX_RETRIES => self.max_retries.map(|v| v.to_string()),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    /// Default configuration file paths to check, in order
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".ovhgate.yaml"),
            PathBuf::from(".ovhgate.yml"),
            PathBuf::from(".ovhgate.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let dir = config_dir.join("ovhgate");
            paths.push(dir.join("config.yaml"));
            paths.push(dir.join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".ovhgate.yaml"));
            paths.push(home_dir.join(".ovhgate.json"));
        }

        paths
    }

    /// Build the gateway configuration from the environment and this file
    ///
    /// `.env` has already been loaded by [`crate::cli::Cli::parse_args`].
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        self.gateway_config_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::gateway_config`] with an explicit environment
    pub fn gateway_config_with<F>(&self, env: F) -> Result<GatewayConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = &self.gateway;
        GatewayConfig::from_lookup(|key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| settings.lookup(key))
        })
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovhgate_core::AuthMethod;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::Builder;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_yaml_file() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "gateway:\n  endpoint: ovh-ca\n  auth_method: bearer\n  timeout_ms: 5000\noutput:\n  color: false"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.gateway.endpoint.as_deref(), Some("ovh-ca"));
        assert_eq!(config.gateway.timeout_ms, Some(5000));
        assert!(!config.output.color);
        assert!(config.output.progress);
    }

    #[test]
    fn test_json_file() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"gateway": {{"max_retries": 1}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.gateway.max_retries, Some(1));
    }

    #[test]
    fn test_secrets_in_file_are_rejected() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "gateway:\n  application_secret: oops").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/ovhgate.yaml")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = Config {
            gateway: GatewaySettings {
                endpoint: Some("ovh-us".to_string()),
                auth_method: Some("bearer".to_string()),
                timeout_ms: Some(5000),
                max_retries: Some(1),
                ..GatewaySettings::default()
            },
            ..Config::default()
        };

        let gateway = config
            .gateway_config_with(env(&[("OVH_REQUEST_TIMEOUT_MS", "2500")]))
            .unwrap();
        assert_eq!(gateway.auth.method(), AuthMethod::Bearer);
        assert_eq!(gateway.base_url, "https://api.us.ovhcloud.com/1.0");
        assert_eq!(gateway.request_timeout, Duration::from_millis(2500));
        assert_eq!(gateway.max_retries, 1);
    }

    #[test]
    fn test_secrets_come_from_environment() {
        let config = Config {
            gateway: GatewaySettings {
                auth_method: Some("oauth2".to_string()),
                ..GatewaySettings::default()
            },
            ..Config::default()
        };

        let err = config.gateway_config_with(env(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let gateway = config
            .gateway_config_with(env(&[
                ("OVH_CLIENT_ID", "id"),
                ("OVH_CLIENT_SECRET", "secret"),
            ]))
            .unwrap();
        assert_eq!(gateway.auth.method(), AuthMethod::OAuth2);
        assert!(gateway.has_credentials());
    }
}
