//! Environment-driven configuration for the services.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds applied to every remote call made while syncing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub remote_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Hosted progress table (PostgREST-style API).
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub api_key: String,
    /// Signed-in user's access token; falls back to the api key.
    pub access_token: Option<String>,
}

/// OpenAI-compatible chat completion endpoint used for quiz questions.
#[derive(Clone, Debug)]
pub struct QuizConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug, Default)]
pub struct ServicesConfig {
    pub sync: SyncConfig,
    pub remote: Option<RemoteConfig>,
    pub quiz: Option<QuizConfig>,
}

impl ServicesConfig {
    /// Read `LINGUA_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or timeout is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServicesConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or timeout is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let sync = match var("LINGUA_REMOTE_TIMEOUT_SECS") {
            None => SyncConfig::default(),
            Some(value) => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ConfigError::InvalidTimeout {
                        var: "LINGUA_REMOTE_TIMEOUT_SECS",
                        value: value.clone(),
                    })?;
                SyncConfig {
                    remote_timeout: Duration::from_secs(secs),
                }
            }
        };

        let remote = match (var("LINGUA_REMOTE_URL"), var("LINGUA_REMOTE_API_KEY")) {
            (Some(raw), Some(api_key)) => {
                let base_url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl {
                    var: "LINGUA_REMOTE_URL",
                    value: raw.clone(),
                })?;
                Some(RemoteConfig {
                    base_url,
                    api_key,
                    access_token: var("LINGUA_REMOTE_ACCESS_TOKEN"),
                })
            }
            _ => None,
        };

        let quiz = match var("LINGUA_AI_API_KEY") {
            None => None,
            Some(api_key) => {
                let base_url =
                    var("LINGUA_AI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
                if Url::parse(&base_url).is_err() {
                    return Err(ConfigError::InvalidUrl {
                        var: "LINGUA_AI_BASE_URL",
                        value: base_url,
                    });
                }
                let model = var("LINGUA_AI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
                Some(QuizConfig {
                    base_url,
                    api_key,
                    model,
                })
            }
        };

        Ok(Self { sync, remote, quiz })
    }
}
