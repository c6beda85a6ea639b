// ── Configuration loading ──
//
// Figment stack: TOML file, then SENTRA_* environment variables, then
// CLI flags on top. A missing password falls back to an interactive
// prompt.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use sentra_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Optional fields as they appear in the config file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<Url>,
    pub status_url: Option<Url>,
    pub element_interval_minutes: Option<u64>,
    pub event_interval_seconds: Option<u64>,
    pub health_interval_seconds: Option<u64>,
    pub authorize_hours: Option<u64>,
    pub retry_delay_seconds: Option<u64>,
    pub writeback_poll_delay_ms: Option<u64>,
}

/// Default config file location: `~/.config/sentra/config.toml`.
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("io", "sentra-home", "sentra").map_or_else(
        || PathBuf::from("sentra.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

pub fn load_file_config(path: &PathBuf) -> Result<FileConfig, CliError> {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SENTRA_"))
        .extract()
        .map_err(|err| CliError::Config {
            path: path.display().to_string(),
            source: Box::new(err),
        })
}

/// Resolve the engine configuration from file, environment, and flags.
pub fn resolve(global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    let path = global.config.clone().unwrap_or_else(default_config_path);
    let file = load_file_config(&path)?;

    let email = global
        .email
        .clone()
        .or(file.email)
        .ok_or(CliError::NoCredentials)?;

    let password = match global.password.clone().or(file.password) {
        Some(password) => SecretString::from(password),
        None => prompt_password()?,
    };

    let mut config = EngineConfig::new(email, password);
    if let Some(url) = file.base_url {
        config.base_url = url;
    }
    if let Some(url) = file.status_url {
        config.status_url = url;
    }
    if let Some(v) = file.element_interval_minutes {
        config.element_interval_minutes = v;
    }
    if let Some(v) = file.event_interval_seconds {
        config.event_interval_seconds = v;
    }
    if let Some(v) = file.health_interval_seconds {
        config.health_interval_seconds = v;
    }
    if let Some(v) = file.authorize_hours {
        config.authorize_hours = v;
    }
    if let Some(v) = file.retry_delay_seconds {
        config.retry_delay_seconds = v;
    }
    if let Some(v) = file.writeback_poll_delay_ms {
        config.writeback_poll_delay_ms = v;
    }
    Ok(config)
}

fn prompt_password() -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password("Cloud account password: ")
        .map_err(|_| CliError::NoCredentials)?;
    if password.is_empty() {
        return Err(CliError::NoCredentials);
    }
    Ok(SecretString::from(password))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn file_config_round_trips_through_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "email = \"user@example.com\"\n\
             password = \"secret\"\n\
             event_interval_seconds = 30"
        )
        .unwrap();

        let config = load_file_config(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.email.as_deref(), Some("user@example.com"));
        assert_eq!(config.event_interval_seconds, Some(30));
        assert_eq!(config.element_interval_minutes, None);
    }
}
