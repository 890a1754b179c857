use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PREVIEW_LIMIT: usize = 5;
const DEFAULT_BINS: usize = 10;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_SESSIONS: u64 = 1000;
const DEFAULT_SAMPLE_SEED: u64 = 42;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub max_file_size: usize,
    pub preview_limit: usize,
    pub default_bins: usize,
    pub session_ttl: Duration,
    pub max_sessions: u64,
    pub sample_seed: u64,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            max_file_size: default_max_file_size(),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            default_bins: DEFAULT_BINS,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
            sample_seed: DEFAULT_SAMPLE_SEED,
            allowed_origins: Vec::new(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={}", key, raw)),
        _ => Ok(default),
    }
}

/// A `*` anywhere in the list allows every origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<&str> = raw.split(',').map(|o| o.trim()).filter(|o| !o.is_empty()).collect();
    if origins.contains(&"*") {
        return Vec::new();
    }
    origins.into_iter().map(|o| o.to_string()).collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        let defaults = Config::default();

        Ok(Config {
            host: env_or("HOST", defaults.host)?,
            port: env_or("PORT", defaults.port)?,
            max_file_size: env_or("MAX_FILE_SIZE", defaults.max_file_size)?,
            preview_limit: env_or("PREVIEW_LIMIT", defaults.preview_limit)?,
            default_bins: env_or("DEFAULT_BINS", defaults.default_bins)?,
            session_ttl: Duration::from_secs(env_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?),
            max_sessions: env_or("MAX_SESSIONS", defaults.max_sessions)?,
            sample_seed: env_or("SAMPLE_SEED", defaults.sample_seed)?,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::from_env()?;
    tracing::info!(
        "Loaded configuration: addr={}, max_file_size={}, session_ttl={:?}",
        config.socket_addr(),
        config.max_file_size,
        config.session_ttl
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.preview_limit, 5);
        assert_eq!(config.default_bins, 10);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn wildcard_origin_means_any() {
        assert!(parse_origins("*").is_empty());
        assert!(parse_origins("http://a, *").is_empty());
        assert!(parse_origins("*,http://a").is_empty());
        assert_eq!(
            parse_origins("http://localhost:3000, https://app.example.com"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }
}
