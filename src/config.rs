//! Provider configuration: explicit URL and keys, or a cloudmonkey style INI
//! file with one section per profile.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File, FileFormat};

use crate::cloudstack::{ClientConfig, DEFAULT_ASYNC_TIMEOUT};
use crate::error::{ProviderError, Result};

pub const DEFAULT_PROFILE: &str = "cloudstack";

/// Raw provider settings as given on the command line or in the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub http_get_only: bool,
    /// Async job timeout in seconds.
    pub timeout: Option<u64>,
}

/// One `[profile]` section of a config file.
#[derive(Debug, Clone, PartialEq)]
struct Profile {
    url: String,
    api_key: String,
    secret_key: String,
    timeout: Option<u64>,
}

impl ProviderConfig {
    /// Validates the settings and produces the client configuration.
    pub fn resolve(&self) -> Result<ClientConfig> {
        let explicit = [&self.api_url, &self.api_key, &self.secret_key];

        let (url, api_key, secret_key, profile_timeout) = match &self.config {
            Some(path) => {
                if explicit.iter().any(|v| v.is_some()) {
                    return Err(ProviderError::Config(
                        "config conflicts with api_url, api_key and secret_key".to_string(),
                    ));
                }
                let profile_name = self.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
                let profile = load_profile(&expand_home(path), profile_name)?;
                tracing::debug!(profile = profile_name, url = %profile.url, "loaded config profile");
                (profile.url, profile.api_key, profile.secret_key, profile.timeout)
            }
            None => (
                required(&self.api_url, "api_url", "CLOUDSTACK_API_URL")?,
                required(&self.api_key, "api_key", "CLOUDSTACK_API_KEY")?,
                required(&self.secret_key, "secret_key", "CLOUDSTACK_SECRET_KEY")?,
                None,
            ),
        };

        let mut client = ClientConfig::new(url, api_key, secret_key);
        client.http_get_only = self.http_get_only;
        client.async_timeout = self
            .timeout
            .or(profile_timeout)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ASYNC_TIMEOUT);
        Ok(client)
    }
}

fn required(value: &Option<String>, name: &str, env: &str) -> Result<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ProviderError::Config(format!(
            "{} is required (set --{} or {}) unless a config file is used",
            name,
            name.replace('_', "-"),
            env
        ))),
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn load_profile(path: &Path, name: &str) -> Result<Profile> {
    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini))
        .build()
        .map_err(|e| {
            ProviderError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;

    // Some config versions lowercase section names.
    let section = [name.to_string(), name.to_lowercase()]
        .into_iter()
        .find(|s| settings.get_table(s).is_ok())
        .ok_or_else(|| {
            ProviderError::Config(format!("profile [{}] not found in {}", name, path.display()))
        })?;

    let get = |key: &str| {
        settings
            .get_string(&format!("{}.{}", section, key))
            .map_err(|_| ProviderError::Config(format!("profile [{}] has no '{}'", name, key)))
    };

    let timeout = match settings.get_int(&format!("{}.timeout", section)) {
        Ok(t) if t > 0 => Some(t as u64),
        _ => None,
    };

    Ok(Profile {
        url: get("url")?,
        api_key: get("apikey")?,
        secret_key: get("secretkey")?,
        timeout,
    })
}
