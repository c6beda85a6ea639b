// ── Engine configuration ──

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use sentra_api::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_STATUS_URL};

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

fn default_status_url() -> Url {
    Url::parse(DEFAULT_STATUS_URL).expect("default status URL is valid")
}

fn default_element_interval() -> u64 {
    5
}

fn default_event_interval() -> u64 {
    10
}

fn default_health_interval() -> u64 {
    60
}

fn default_authorize_hours() -> u64 {
    6
}

fn default_retry_delay() -> u64 {
    300
}

fn default_writeback_delay_ms() -> u64 {
    2500
}

/// Everything the engine needs to run: credentials, cloud endpoints,
/// and per-job cadences. Loaded from file/env by the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub email: String,
    pub password: SecretString,

    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_status_url")]
    pub status_url: Url,

    /// Minutes between full element refreshes. 0 disables the job.
    #[serde(default = "default_element_interval")]
    pub element_interval_minutes: u64,
    /// Seconds between event polls. 0 disables the job.
    #[serde(default = "default_event_interval")]
    pub event_interval_seconds: u64,
    /// Seconds between health polls. 0 disables the job.
    #[serde(default = "default_health_interval")]
    pub health_interval_seconds: u64,

    /// Hours before the cloud session is proactively renewed.
    #[serde(default = "default_authorize_hours")]
    pub authorize_hours: u64,

    /// Fixed delay between connection retry attempts. Not exponential.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    /// Delay before the accelerated event re-poll after a write-back.
    #[serde(default = "default_writeback_delay_ms")]
    pub writeback_poll_delay_ms: u64,
}

impl EngineConfig {
    /// Config with default endpoints and cadences for the given account.
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
            base_url: default_base_url(),
            status_url: default_status_url(),
            element_interval_minutes: default_element_interval(),
            event_interval_seconds: default_event_interval(),
            health_interval_seconds: default_health_interval(),
            authorize_hours: default_authorize_hours(),
            retry_delay_seconds: default_retry_delay(),
            writeback_poll_delay_ms: default_writeback_delay_ms(),
        }
    }

    pub fn element_interval(&self) -> Duration {
        Duration::from_secs(self.element_interval_minutes * 60)
    }

    pub fn event_interval(&self) -> Duration {
        Duration::from_secs(self.event_interval_seconds)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn writeback_poll_delay(&self) -> Duration {
        Duration::from_millis(self.writeback_poll_delay_ms)
    }

    /// The API-client slice of this configuration.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            status_url: self.status_url.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            authorize_hours: self.authorize_hours,
        }
    }
}
