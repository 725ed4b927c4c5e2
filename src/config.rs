use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::payout::{HttpPayoutConfig, PiteasConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// SQLite file holding withdrawal requests
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub payout: PayoutConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Which payout executor to construct, and its connection parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum PayoutConfig {
    Simulator {
        #[serde(default = "default_simulator_delay_ms")]
        delay_ms: u64,
    },
    Http(HttpPayoutConfig),
    Piteas(PiteasConfig),
}

impl Default for PayoutConfig {
    fn default() -> Self {
        PayoutConfig::Simulator {
            delay_ms: default_simulator_delay_ms(),
        }
    }
}

impl PayoutConfig {
    pub fn provider(&self) -> &'static str {
        match self {
            PayoutConfig::Simulator { .. } => "simulator",
            PayoutConfig::Http(_) => "http",
            PayoutConfig::Piteas(_) => "piteas",
        }
    }

    /// Replace the credential of the selected provider
    fn set_api_key(&mut self, key: String) {
        match self {
            PayoutConfig::Simulator { .. } => {}
            PayoutConfig::Http(cfg) => cfg.api_key = Some(key),
            PayoutConfig::Piteas(cfg) => cfg.api_key = key,
        }
    }
}

fn default_database_path() -> String {
    "withdrawals.db".to_string()
}

fn default_simulator_delay_ms() -> u64 {
    250
}

impl AppConfig {
    /// Load `config/{env}.yaml`, apply environment overrides and validate
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let mut config = Self::from_file(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// `DATABASE_PATH`, `API_PORT` and `PAYOUT_API_KEY` win over the file
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("DATABASE_PATH").filter(|v| !v.is_empty()) {
            self.database_path = path;
        }
        if let Some(port) = lookup("API_PORT").filter(|v| !v.is_empty()) {
            self.gateway.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "API_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(key) = lookup("PAYOUT_API_KEY").filter(|v| !v.is_empty()) {
            self.payout.set_api_key(key);
        }
        Ok(())
    }

    /// Presence checks for the selected payout provider
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path must be set".into()));
        }
        match &self.payout {
            PayoutConfig::Simulator { .. } => Ok(()),
            PayoutConfig::Http(cfg) if cfg.endpoint.trim().is_empty() => Err(
                ConfigError::Invalid("http payout provider selected but endpoint is empty".into()),
            ),
            PayoutConfig::Http(_) => Ok(()),
            PayoutConfig::Piteas(cfg) => {
                let missing = cfg.missing_fields();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ConfigError::Invalid(format!(
                        "Piteas wallet provider selected but missing required settings: {}",
                        missing.join(", ")
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const BASE: &str = r#"
log_level: "info"
log_dir: "./logs"
log_file: "bridge.log"
use_json: false
rotation: "daily"
gateway:
  host: "0.0.0.0"
  port: 8080
"#;

    #[test]
    fn test_defaults_to_simulator() {
        let config = AppConfig::from_yaml(BASE).unwrap();
        assert_eq!(config.payout, PayoutConfig::default());
        assert_eq!(config.payout.provider(), "simulator");
        assert_eq!(config.database_path, "withdrawals.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_provider() {
        let yaml = format!(
            "{BASE}payout:\n  provider: http\n  endpoint: \"https://pay.example.com/out\"\n  api_key: \"k\"\n"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        match &config.payout {
            PayoutConfig::Http(cfg) => {
                assert_eq!(cfg.endpoint, "https://pay.example.com/out");
                assert_eq!(cfg.api_key.as_deref(), Some("k"));
                assert_eq!(cfg.timeout_secs, 30);
            }
            other => panic!("unexpected payout config {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_piteas_missing_settings_listed() {
        let yaml = format!("{BASE}payout:\n  provider: piteas\n  project_id: \"p1\"\n");
        let config = AppConfig::from_yaml(&yaml).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_key, wallet_id, asset_symbol, network"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let yaml = format!("{BASE}payout:\n  provider: paypal\n");
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let yaml = format!(
            "{BASE}payout:\n  provider: piteas\n  project_id: p\n  wallet_id: w\n  asset_symbol: USDT\n  network: tron\n"
        );
        let mut config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(config.validate().is_err());

        let env: HashMap<&str, &str> = [
            ("DATABASE_PATH", "/var/lib/bridge.db"),
            ("API_PORT", "9090"),
            ("PAYOUT_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path, "/var/lib/bridge.db");
        assert_eq!(config.gateway.port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = AppConfig::from_yaml(BASE).unwrap();
        let err = config
            .apply_env_overrides(|name| (name == "API_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "API_PORT", .. }));
    }
}
