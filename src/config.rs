use std::time::Duration;

use crate::crud::CachePreset;
use crate::errors::AppError;
use crate::obfuscation::PathObfuscator;
use crate::retry::RetryPolicy;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Console settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub api_base_url: String,
    pub retry: RetryPolicy,
    pub url_secret: Option<String>,
    pub default_preset: CachePreset,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let retries = lookup("API_RETRIES")
            .map(|val| val.parse::<u32>())
            .unwrap_or(Ok(DEFAULT_RETRIES))
            .map_err(|_| AppError::configuration("API_RETRIES must be a non-negative integer"))?;

        let delay_ms = lookup("API_RETRY_DELAY_MS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_RETRY_DELAY_MS))
            .map_err(|_| AppError::configuration("API_RETRY_DELAY_MS must be a non-negative integer"))?;

        let default_preset = lookup("DEFAULT_CACHE_PRESET")
            .map(|val| val.parse::<CachePreset>())
            .unwrap_or(Ok(CachePreset::default()))?;

        let url_secret = lookup("URL_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            api_base_url,
            retry: RetryPolicy::new(retries, Duration::from_millis(delay_ms)),
            url_secret,
            default_preset,
        })
    }

    pub fn obfuscator(&self) -> Result<PathObfuscator, AppError> {
        let secret = self
            .url_secret
            .as_deref()
            .ok_or_else(|| AppError::configuration("URL_SECRET not set"))?;
        PathObfuscator::new(secret)
    }
}
