//! Configuration management
//! Supports TOML, YAML, JSON config files with `TT__` environment overrides

use ::config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::{Credentials, CERT_API_URL, PROD_API_URL};
use crate::strategy::{DcaConfig, RiskReversalConfig, SweepConfig};
use crate::trading::{ReconcileConfig, TrackerConfig};

const REDACTED: &str = "******REMOVED******";

/// Default file names searched in the working directory
const DEFAULT_LOCATIONS: [&str; 5] = [
    "tt-trader.toml",
    "tt-trader.yaml",
    "tt-trader.yml",
    "tt-trader.json",
    ".tt-trader.toml",
];

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account credentials and endpoints
    pub broker: BrokerConfig,
    pub tracker: TrackerConfig,
    pub reconcile: ReconcileConfig,
    pub sweep: SweepConfig,
    pub dca: DcaConfig,
    pub risk_reversal: RiskReversalConfig,
    /// Logging level
    pub log_level: Option<String>,
}

/// Broker account settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub username: String,
    pub password: String,
    pub account_number: String,
    /// Production when true, the certification sandbox otherwise
    pub use_prod: bool,
    pub prod_url: String,
    pub cert_url: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            account_number: String::new(),
            use_prod: true,
            prod_url: PROD_API_URL.to_string(),
            cert_url: CERT_API_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("username", &self.username)
            .field("password", &"****")
            .field("account_number", &crate::api::mask_account(&self.account_number))
            .field("use_prod", &self.use_prod)
            .field("prod_url", &self.prod_url)
            .field("cert_url", &self.cert_url)
            .finish()
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;

        let config = match extension(path).as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                if content.trim_start().starts_with('{') {
                    serde_json::from_str(&content)?
                } else if content.contains("---") {
                    serde_yaml::from_str(&content)?
                } else {
                    toml::from_str(&content)?
                }
            }
        };

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// First config file found in the default locations
    pub fn find_default() -> Option<PathBuf> {
        let local = DEFAULT_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists());
        if local.is_some() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("tt-trader/config.toml"))
            .filter(|p| p.exists())
    }

    /// Load from default locations
    pub fn load() -> anyhow::Result<Self> {
        match Self::find_default() {
            Some(path) => Self::from_file(path),
            None => anyhow::bail!(
                "No configuration file found. Expected one of: {:?} or <config dir>/tt-trader/config.toml",
                DEFAULT_LOCATIONS
            ),
        }
    }

    /// File (if any) overlaid with `TT__SECTION__KEY` environment variables
    pub fn layered(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from: {}", path.display());
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("TT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Resolve the configuration the CLI runs with.
    ///
    /// An explicit path must exist. Without one the default locations are
    /// tried, and plain environment variables fill any missing credentials.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = Self::resolve_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`Config::resolve`] without credential checks, for offline commands
    pub fn resolve_unvalidated(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) if !p.exists() => anyhow::bail!("Config file not found: {}", p.display()),
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_default(),
        };
        if file.is_none() {
            warn!("No config file found, using defaults and environment");
        }

        let mut config = Self::layered(file.as_deref())?;
        config.merge_env_credentials();
        Ok(config)
    }

    fn merge_env_credentials(&mut self) {
        let env = from_env();
        let broker = &mut self.broker;
        if broker.username.is_empty() {
            broker.username = env.broker.username;
        }
        if broker.password.is_empty() {
            broker.password = env.broker.password;
        } else if std::env::var("TASTYTRADE_PASSWORD").is_err()
            && std::env::var("TT__BROKER__PASSWORD").is_err()
        {
            warn!("⚠️  Password loaded from config file; prefer TASTYTRADE_PASSWORD");
        }
        if broker.account_number.is_empty() {
            broker.account_number = env.broker.account_number;
        }
        if self.log_level.is_none() {
            self.log_level = env.log_level;
        }
    }

    /// Save configuration to file (SECURITY: removes sensitive data before saving)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();

        let mut safe_config = self.clone();
        safe_config.broker.password = REDACTED.to_string();

        let content = match extension(path).as_deref() {
            Some("toml") => toml::to_string_pretty(&safe_config)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(&safe_config)?,
            _ => serde_json::to_string_pretty(&safe_config)?,
        };

        std::fs::write(path, content)?;
        info!("Configuration saved to: {} (sensitive data redacted)", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let broker = &self.broker;
        if broker.username.trim().is_empty() {
            anyhow::bail!("Username is required (broker.username or TASTYTRADE_USERNAME)");
        }
        if broker.password.is_empty() || broker.password == REDACTED {
            anyhow::bail!("Password is required (broker.password or TASTYTRADE_PASSWORD)");
        }
        if broker.account_number.trim().is_empty() {
            anyhow::bail!("Account number is required (broker.account_number or TASTYTRADE_ACCOUNT)");
        }
        for url in [&broker.prod_url, &broker.cert_url] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                anyhow::bail!("API URL must be http(s): {}", url);
            }
        }

        if self.tracker.poll_interval.is_zero() {
            anyhow::bail!("tracker.poll_interval must be positive");
        }
        if self.tracker.timeout < self.tracker.poll_interval {
            anyhow::bail!("tracker.timeout must be at least one poll interval");
        }
        if self.tracker.max_consecutive_failures == 0 {
            anyhow::bail!("tracker.max_consecutive_failures must be at least 1");
        }
        if self.sweep.symbol.trim().is_empty() {
            anyhow::bail!("sweep.symbol is required");
        }
        if self.dca.steps == 0 {
            anyhow::bail!("dca.steps must be at least 1");
        }
        if self.dca.discount <= rust_decimal::Decimal::ZERO {
            anyhow::bail!("dca.discount must be positive");
        }
        if self.risk_reversal.default_quantity <= rust_decimal::Decimal::ZERO {
            anyhow::bail!("risk_reversal.default_quantity must be positive");
        }
        Ok(())
    }

    /// API root. `use_prod` from config unless the CLI overrides it.
    pub fn base_url(&self, use_prod: Option<bool>) -> &str {
        if use_prod.unwrap_or(self.broker.use_prod) {
            &self.broker.prod_url
        } else {
            &self.broker.cert_url
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.broker.username.clone(), self.broker.password.clone())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Load config from environment variables (fallback)
pub fn from_env() -> Config {
    use std::env;

    let defaults = BrokerConfig::default();
    Config {
        broker: BrokerConfig {
            username: env::var("TASTYTRADE_USERNAME").unwrap_or_default(),
            password: env::var("TASTYTRADE_PASSWORD").unwrap_or_default(),
            account_number: env::var("TASTYTRADE_ACCOUNT").unwrap_or_default(),
            use_prod: env::var("TASTYTRADE_USE_PROD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.use_prod),
            ..defaults
        },
        log_level: env::var("LOG_LEVEL").ok(),
        ..Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn valid() -> Config {
        let mut config = Config::default();
        config.broker.username = "trader".to_string();
        config.broker.password = "hunter2".to_string();
        config.broker.account_number = "5WX12345".to_string();
        config
    }

    fn write_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.broker.use_prod);
        assert_eq!(config.broker.prod_url, PROD_API_URL);
        assert_eq!(config.tracker.timeout, Duration::from_secs(60));
        assert_eq!(config.sweep.symbol, "SGOV");
        assert_eq!(config.dca.steps, 10);
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.broker.account_number = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_tracker_bounds() {
        let mut config = valid();
        config.tracker.timeout = Duration::from_millis(500);
        assert!(config.validate().is_err());

        let mut config = valid();
        config.tracker.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_selection() {
        let mut config = valid();
        assert_eq!(config.base_url(None), PROD_API_URL);
        assert_eq!(config.base_url(Some(false)), CERT_API_URL);
        config.broker.use_prod = false;
        assert_eq!(config.base_url(None), CERT_API_URL);
        assert_eq!(config.base_url(Some(true)), PROD_API_URL);
    }

    #[test]
    fn test_from_toml_with_partial_sections() {
        let file = write_file(
            ".toml",
            r#"
log_level = "debug"

[broker]
username = "trader"
password = "secret"
account_number = "5WX12345"
use_prod = false

[tracker]
poll_interval = 0.5
timeout = 20

[sweep]
symbol = "BIL"
"#,
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.broker.account_number, "5WX12345");
        assert!(!config.broker.use_prod);
        assert_eq!(config.tracker.poll_interval, Duration::from_millis(500));
        assert_eq!(config.tracker.max_consecutive_failures, 3);
        assert_eq!(config.sweep.symbol, "BIL");
        assert_eq!(config.dca.discount, dec!(0.95));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let file = write_file(
            ".yaml",
            "broker:\n  username: trader\n  password: secret\n  account_number: ABC123\ndca:\n  capital: 5000\n  steps: 5\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.dca.capital, dec!(5000));
        assert_eq!(config.dca.steps, 5);
    }

    #[test]
    fn test_save_redacts_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        valid().save_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("hunter2"));

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.broker.username, "trader");
        assert_eq!(reloaded.broker.password, REDACTED);
        assert!(reloaded.validate().is_err());
    }

    #[test]
    fn test_layered_reads_file() {
        let file = write_file(
            ".json",
            r#"{ "broker": { "username": "trader", "password": "pw", "account_number": "ACC1" },
                 "risk_reversal": { "expiry_choice": 1 } }"#,
        );
        let config = Config::layered(Some(file.path())).unwrap();
        assert_eq!(config.broker.username, "trader");
        assert_eq!(
            config.risk_reversal.expiry_choice,
            crate::strategy::ExpiryChoice::Medium
        );
    }

    #[test]
    fn test_resolve_missing_explicit_path() {
        let err = Config::resolve(Some(Path::new("/nonexistent/tt-trader.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_debug_hides_password() {
        let text = format!("{:?}", valid().broker);
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("5WX12345"));
    }
}
