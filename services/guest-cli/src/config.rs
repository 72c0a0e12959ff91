//! Configuration types and loading
//!
//! Config file precedence: `--config` flag > GUESTCTL_CONFIG env var >
//! `guestctl.toml` in the working directory. GUEST_API_BASE_URL overrides
//! `api.base_url`. The login password is never read from the TOML.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the session survives between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_token_file() -> PathBuf {
    PathBuf::from("guestctl-tokens.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(base_url) = std::env::var("GUEST_API_BASE_URL") {
            config.api.base_url = base_url;
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or GUESTCTL_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("GUESTCTL_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("guestctl.toml")
    }
}

/// Resolve the login password: GUESTCTL_PASSWORD env var, then `password_file`.
pub fn resolve_password(password_file: Option<&Path>) -> common::Result<Secret<String>> {
    if let Ok(password) = std::env::var("GUESTCTL_PASSWORD") {
        return Ok(Secret::new(password));
    }
    let Some(file) = password_file else {
        return Err(common::Error::Config(
            "no password: set GUESTCTL_PASSWORD or pass --password-file".into(),
        ));
    };
    let password = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!(
            "failed to read password file {}: {e}",
            file.display()
        ))
    })?;
    let password = password.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(common::Error::Config(format!(
            "password file {} is empty",
            file.display()
        )));
    }
    Ok(Secret::new(password))
}
