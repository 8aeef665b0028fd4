use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "FARE_GUARD_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationSettings {
    pub enabled: bool,
    pub grace_period_secs: u64,
}

impl Default for DeduplicationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferSettings {
    /// How often records past retention are swept
    pub sweep_interval_secs: u64,
}

impl Default for OfferSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Upper bound on a single upstream search, applied around the executor
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { timeout_secs: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub deduplication: DeduplicationSettings,
    pub offers: OfferSettings,
    pub search: SearchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            log_level: "info".to_string(),
            deduplication: DeduplicationSettings::default(),
            offers: OfferSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl Config {
    /// Read the YAML file at `path`, then apply `FARE_GUARD_*` overrides.
    ///
    /// A missing file is not an error; defaults fill in whatever is absent.
    /// Nested keys are addressed with a double underscore, e.g.
    /// `FARE_GUARD_DEDUPLICATION__ENABLED=false`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|err| ConfigError::Figment(Box::new(err)))
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.deduplication.grace_period_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.offers.sweep_interval_secs.max(1))
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new("fare-guard").unwrap();
        let config = Config::load(&dir.path().join("absent.yaml")).unwrap();

        assert_eq!(config.port, 8000);
        assert!(config.deduplication.enabled);
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Info);
    }

    #[test]
    fn test_partial_file_is_merged_with_defaults() {
        let dir = TempDir::new("fare-guard").unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "port: 9100\nlog_level: debug\ndeduplication:\n  enabled: false\noffers:\n  sweep_interval_secs: 60\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.port, 9100);
        assert!(!config.deduplication.enabled);
        assert_eq!(config.deduplication.grace_period_secs, 5);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.search_timeout(), Duration::from_secs(20));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_log_level() {
        let config = Config {
            log_level: "chatty".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            config.level_filter(),
            Err(ConfigError::InvalidLogLevel(level)) if level == "chatty"
        ));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new("fare-guard").unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "port: not-a-number\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Figment(_))));
    }
}
