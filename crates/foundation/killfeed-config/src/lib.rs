//! # Killfeed Config
//!
//! Layered configuration for the feed monitor.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults
//! 2. YAML file (`~/.config/killfeed/config.yaml` unless a path is given)
//! 3. `KILLFEED_*` environment variables
//!
//! CLI flags are applied on top by the binary.

use killfeed_core::{LogScaler, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type for killfeed-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Upper bound the RedisQ endpoint accepts for `ttw`
pub const MAX_WAIT_SECS: u64 = 10;

/// Upper bound on the client-side allowance past `ttw`
pub const MAX_REQUEST_GRACE_SECS: u64 = 300;

pub const DEFAULT_ENDPOINT: &str = "https://zkillredisq.stream/listen.php";

/// Parameters of the default log scaler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Multiplier for a zero-value kill
    pub floor: f64,
    /// ISK value at which the multiplier grows by ln 2
    pub pivot: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        let scaler = LogScaler::default();
        Self {
            floor: scaler.floor,
            pivot: scaler.pivot,
        }
    }
}

/// Feed monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Long-poll endpoint
    pub endpoint: String,

    /// Server-side wait hint (`ttw`), seconds
    pub wait_secs: u64,

    /// Extra client-side allowance on top of the wait hint before a request times out
    pub request_grace_secs: u64,

    /// Lifetime of a record whose scaled value is 1.0
    pub base_retention_ms: u64,

    /// Period of the retention sweep
    pub sweep_interval_ms: u64,

    /// Pause after a failed poll
    pub failure_cooldown_ms: u64,

    /// Explicit queue id; skips the identity file when set
    pub queue_id: Option<String>,

    /// Where the queue id is persisted
    pub queue_id_path: Option<PathBuf>,

    pub scale: ScaleConfig,

    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            wait_secs: MAX_WAIT_SECS,
            request_grace_secs: 15,
            base_retention_ms: killfeed_core::retention::DEFAULT_BASE_RETENTION_MS,
            sweep_interval_ms: 5_000,
            failure_cooldown_ms: 1_000,
            queue_id: None,
            queue_id_path: None,
            scale: ScaleConfig::default(),
            user_agent: concat!("killfeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    /// Directory holding config and queue identity (~/.config/killfeed)
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("killfeed")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Load defaults, then the YAML file, then the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply `KILLFEED_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KILLFEED_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("KILLFEED_WAIT_SECS") {
            self.wait_secs = parse_num("KILLFEED_WAIT_SECS", &v)?;
        }
        if let Some(v) = lookup("KILLFEED_REQUEST_GRACE_SECS") {
            self.request_grace_secs = parse_num("KILLFEED_REQUEST_GRACE_SECS", &v)?;
        }
        if let Some(v) = lookup("KILLFEED_BASE_RETENTION_MS") {
            self.base_retention_ms = parse_num("KILLFEED_BASE_RETENTION_MS", &v)?;
        }
        if let Some(v) = lookup("KILLFEED_SWEEP_INTERVAL_MS") {
            self.sweep_interval_ms = parse_num("KILLFEED_SWEEP_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("KILLFEED_FAILURE_COOLDOWN_MS") {
            self.failure_cooldown_ms = parse_num("KILLFEED_FAILURE_COOLDOWN_MS", &v)?;
        }
        if let Some(v) = lookup("KILLFEED_QUEUE_ID") {
            self.queue_id = Some(v).filter(|v| !v.is_empty());
        }
        if let Some(v) = lookup("KILLFEED_QUEUE_ID_PATH") {
            self.queue_id_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint).map_err(|e| Error::InvalidValue {
            key: "endpoint",
            reason: e.to_string(),
        })?;

        if self.wait_secs == 0 || self.wait_secs > MAX_WAIT_SECS {
            return Err(Error::InvalidValue {
                key: "wait_secs",
                reason: format!("must be within 1..={}, got {}", MAX_WAIT_SECS, self.wait_secs),
            });
        }

        // a zero grace times out every idle poll right as the server answers
        if self.request_grace_secs == 0 || self.request_grace_secs > MAX_REQUEST_GRACE_SECS {
            return Err(Error::InvalidValue {
                key: "request_grace_secs",
                reason: format!(
                    "must be within 1..={}, got {}",
                    MAX_REQUEST_GRACE_SECS, self.request_grace_secs
                ),
            });
        }

        for (key, value) in [
            ("base_retention_ms", self.base_retention_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("failure_cooldown_ms", self.failure_cooldown_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidValue {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if !(self.scale.floor > 0.0 && self.scale.floor.is_finite()) {
            return Err(Error::InvalidValue {
                key: "scale.floor",
                reason: format!("must be positive, got {}", self.scale.floor),
            });
        }
        if !(self.scale.pivot > 0.0 && self.scale.pivot.is_finite()) {
            return Err(Error::InvalidValue {
                key: "scale.pivot",
                reason: format!("must be positive, got {}", self.scale.pivot),
            });
        }

        Ok(())
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.base_retention_ms)
    }

    pub fn scaler(&self) -> LogScaler {
        LogScaler::new(self.scale.floor, self.scale.pivot)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }

    /// Client-side bound on one long-poll request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_secs.saturating_add(self.request_grace_secs))
    }

    pub fn queue_id_path(&self) -> PathBuf {
        self.queue_id_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("queue_id"))
    }
}

fn parse_num(key: &'static str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|e| Error::InvalidValue {
        key,
        reason: format!("{:?}: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let config = FeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_retention_ms, 45_000);
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.failure_cooldown(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(25));
    }

    #[test]
    fn test_partial_yaml() {
        let config = FeedConfig::from_yaml_str(
            "wait_secs: 5\nscale:\n  floor: 0.5\nqueue_id: zkbmap-test\n",
        )
        .unwrap();

        assert_eq!(config.wait_secs, 5);
        assert_eq!(config.scale.floor, 0.5);
        assert_eq!(config.scale.pivot, ScaleConfig::default().pivot);
        assert_eq!(config.queue_id.as_deref(), Some("zkbmap-test"));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(FeedConfig::from_yaml_str("  \n").unwrap(), FeedConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KILLFEED_WAIT_SECS", "3"),
            ("KILLFEED_FAILURE_COOLDOWN_MS", "250"),
            ("KILLFEED_QUEUE_ID", "zkbmap-env"),
        ]
        .into_iter()
        .collect();

        let mut config = FeedConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.wait_secs, 3);
        assert_eq!(config.failure_cooldown_ms, 250);
        assert_eq!(config.queue_id.as_deref(), Some("zkbmap-env"));
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = FeedConfig::default();
        let err = config
            .apply_env(|key| (key == "KILLFEED_WAIT_SECS").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { key: "KILLFEED_WAIT_SECS", .. }));
    }

    #[test]
    fn test_validation_rejects() {
        let mut config = FeedConfig::default();
        config.wait_secs = 11;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::default();
        config.sweep_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidValue { key: "sweep_interval_ms", .. })
        ));

        let mut config = FeedConfig::default();
        config.scale.floor = 0.0;
        assert!(config.validate().is_err());

        let mut config = FeedConfig::default();
        config.endpoint = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidValue { key: "endpoint", .. })));
    }

    #[test]
    fn test_request_grace_bounds() {
        let config = FeedConfig::from_yaml_str("request_grace_secs: 18446744073709551615\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidValue { key: "request_grace_secs", .. })
        ));
        assert_eq!(config.request_timeout(), Duration::from_secs(u64::MAX));

        let config = FeedConfig::from_yaml_str("request_grace_secs: 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidValue { key: "request_grace_secs", .. })
        ));

        let mut config = FeedConfig::default();
        config
            .apply_env(|key| (key == "KILLFEED_REQUEST_GRACE_SECS").then(|| "1".to_string()))
            .unwrap();
        assert!(config.validate().is_ok());
        assert!(config.request_timeout() > Duration::from_secs(config.wait_secs));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "base_retention_ms: 60000\n").unwrap();

        let config = FeedConfig::from_file(&path).unwrap();
        assert_eq!(config.base_retention_ms, 60_000);
        assert_eq!(config.retention_policy().base_retention_ms, 60_000);

        assert!(FeedConfig::load(Some(dir.path().join("missing.yaml").as_path())).is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = FeedConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(FeedConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
