use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Client;
use crate::error::HdgApiResult;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct BoilerConfig {
    pub name: String,
    pub url: Url,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Per-group interval overrides, in seconds
    pub intervals: BTreeMap<String, u64>,
    pub concurrency: usize,
    pub failure_threshold: u32,
    pub fallback_interval_secs: u64,
    pub connection_error_threshold: u32,
    pub retry_base_secs: u64,
    pub retry_factor: u32,
    pub retry_max_secs: u64,
    pub ignore_window_secs: u64,
    pub initial_group_delay_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SetterConfig {
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
    pub base_backoff_secs: u64,
    pub connection_backoff_multiplier: u32,
    pub connection_log_multiplier: u32,
    pub max_backoff_secs: u64,
    pub max_attempts: u32,
    pub allow_raw_nodes: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ArbiterConfig {
    pub write_retry_attempts: u32,
    pub write_retry_delay_ms: u64,
    /// How long a low priority read may keep more urgent requests waiting
    pub polling_preemption_timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServerConfig {
    pub ipaddress: Ipv4Addr,
    pub http_port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub boiler: BoilerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub setter: SetterConfig,
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog_file: Option<Utf8PathBuf>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            intervals: BTreeMap::new(),
            concurrency: 5,
            failure_threshold: 3,
            fallback_interval_secs: 300,
            connection_error_threshold: 3,
            retry_base_secs: 15,
            retry_factor: 2,
            retry_max_secs: 900,
            ignore_window_secs: 10,
            initial_group_delay_ms: 2000,
        }
    }
}

impl Default for SetterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            cooldown_ms: 2000,
            base_backoff_secs: 5,
            connection_backoff_multiplier: 2,
            connection_log_multiplier: 3,
            max_backoff_secs: 300,
            max_attempts: 3,
            allow_raw_nodes: false,
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            write_retry_attempts: 3,
            write_retry_delay_ms: 2000,
            polling_preemption_timeout_ms: 1000,
        }
    }
}

impl BoilerConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollingConfig {
    /// Effective interval for `group`, honoring any configured override.
    #[must_use]
    pub fn interval_for(&self, group: &str, default: Duration) -> Duration {
        self.intervals
            .get(group)
            .map_or(default, |secs| Duration::from_secs(*secs))
    }

    #[must_use]
    pub const fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }

    #[must_use]
    pub const fn ignore_window(&self) -> Duration {
        Duration::from_secs(self.ignore_window_secs)
    }

    #[must_use]
    pub const fn initial_group_delay(&self) -> Duration {
        Duration::from_millis(self.initial_group_delay_ms)
    }

    #[must_use]
    pub const fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }

    #[must_use]
    pub const fn retry_max(&self) -> Duration {
        Duration::from_secs(self.retry_max_secs)
    }
}

impl SetterConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    #[must_use]
    pub const fn base_backoff(&self) -> Duration {
        Duration::from_secs(self.base_backoff_secs)
    }

    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl ArbiterConfig {
    #[must_use]
    pub const fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }

    #[must_use]
    pub const fn polling_preemption_timeout(&self) -> Duration {
        Duration::from_millis(self.polling_preemption_timeout_ms)
    }
}

impl Client {
    pub async fn config(&self) -> HdgApiResult<AppConfig> {
        self.get("config").await
    }
}
