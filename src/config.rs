//! Configuration management

use std::time::Duration;

use anyhow::{bail, Result};
use tracing::warn;

use crate::services::http::RetryPolicy;
use crate::services::tour::{SolverBackend, SolverConfig};

/// Where resolution and matrix data come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapsBackend {
    /// Google Places, Geocoding and Distance Matrix web services
    Google,
    /// No remote data: links only resolve when they embed coordinates and
    /// every matrix cell comes from the straight-line estimate
    Mock,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub maps_backend: MapsBackend,

    /// Server key for the Google web services
    pub google_api_key: Option<String>,

    /// Per-call HTTP timeout
    pub request_timeout: Duration,

    pub retry: RetryPolicy,

    /// Matrix tile edge, at most 25
    pub matrix_chunk: usize,

    /// Matrix tiles in flight at once
    pub matrix_concurrency: usize,

    /// Student link resolutions in flight at once
    pub resolve_concurrency: usize,

    pub solver_backend: SolverBackend,

    pub solver: SolverConfig,

    /// Entries per resolution memo
    pub resolve_cache_size: usize,

    /// Entries in the matrix memo
    pub matrix_cache_size: usize,

    /// Lifetime of memoized "not found" results
    pub negative_cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable numbers fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let google_api_key = get("GOOGLE_MAPS_SERVER_KEY");

        let maps_backend = match get("MAPS_BACKEND").map(|v| v.to_lowercase()).as_deref() {
            Some("google") => MapsBackend::Google,
            Some("mock") => MapsBackend::Mock,
            Some(other) => bail!("Unknown MAPS_BACKEND '{}' (expected google or mock)", other),
            None if google_api_key.is_some() => MapsBackend::Google,
            None => MapsBackend::Mock,
        };
        if maps_backend == MapsBackend::Google && google_api_key.is_none() {
            bail!("GOOGLE_MAPS_SERVER_KEY must be set when MAPS_BACKEND is google");
        }

        let solver_backend = match get("SOLVER_BACKEND") {
            Some(value) => SolverBackend::parse(&value).ok_or_else(|| {
                anyhow::anyhow!("Unknown SOLVER_BACKEND '{}' (expected pragmatic or local)", value)
            })?,
            None => SolverBackend::default(),
        };

        let number = |key: &str, default: u64| -> u64 {
            match get(key) {
                None => default,
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!("Invalid {}='{}', using {}", key, raw, default);
                    default
                }),
            }
        };

        Ok(Self {
            maps_backend,
            google_api_key,
            request_timeout: Duration::from_secs(number("REQUEST_TIMEOUT_SECS", 15).max(1)),
            retry: RetryPolicy {
                max_retries: number("RETRY_TOTAL", 3) as u32,
                backoff_base: Duration::from_millis(number("RETRY_BACKOFF_MS", 600)),
            },
            matrix_chunk: number("MATRIX_CHUNK", 25) as usize,
            matrix_concurrency: (number("MATRIX_CONCURRENCY", 4) as usize).max(1),
            resolve_concurrency: (number("RESOLVE_CONCURRENCY", 8) as usize).max(1),
            solver_backend,
            solver: SolverConfig::with_time_limit(number("SOLVER_TIME_LIMIT_SECS", 8) as u32),
            resolve_cache_size: (number("RESOLVE_CACHE_SIZE", 4096) as usize).max(1),
            matrix_cache_size: (number("MATRIX_CACHE_SIZE", 256) as usize).max(1),
            negative_cache_ttl: Duration::from_secs(number("NEGATIVE_CACHE_TTL_SECS", 600)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_key_use_mock_backend() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.maps_backend, MapsBackend::Mock);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_base, Duration::from_millis(600));
        assert_eq!(config.matrix_chunk, 25);
        assert_eq!(config.matrix_concurrency, 4);
        assert_eq!(config.resolve_concurrency, 8);
        assert_eq!(config.solver_backend, SolverBackend::Pragmatic);
        assert_eq!(config.solver.max_time_seconds, 8);
        assert_eq!(config.resolve_cache_size, 4096);
        assert_eq!(config.matrix_cache_size, 256);
        assert_eq!(config.negative_cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_key_selects_google_backend() {
        let config = config_from(&[("GOOGLE_MAPS_SERVER_KEY", "abc")]).unwrap();

        assert_eq!(config.maps_backend, MapsBackend::Google);
        assert_eq!(config.google_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_google_backend_requires_key() {
        assert!(config_from(&[("MAPS_BACKEND", "google")]).is_err());
    }

    #[test]
    fn test_explicit_mock_wins_over_key() {
        let config =
            config_from(&[("MAPS_BACKEND", "Mock"), ("GOOGLE_MAPS_SERVER_KEY", "abc")]).unwrap();
        assert_eq!(config.maps_backend, MapsBackend::Mock);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("MATRIX_CHUNK", "lots"), ("RETRY_TOTAL", "-1")]).unwrap();

        assert_eq!(config.matrix_chunk, 25);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_overrides_are_read() {
        let config = config_from(&[
            ("SOLVER_BACKEND", "local"),
            ("SOLVER_TIME_LIMIT_SECS", "3"),
            ("MATRIX_CONCURRENCY", "0"),
            ("RESOLVE_CONCURRENCY", "2"),
        ])
        .unwrap();

        assert_eq!(config.solver_backend, SolverBackend::Local);
        assert_eq!(config.solver.max_time_seconds, 3);
        assert_eq!(config.matrix_concurrency, 1);
        assert_eq!(config.resolve_concurrency, 2);
    }

    #[test]
    fn test_unknown_solver_backend_is_rejected() {
        assert!(config_from(&[("SOLVER_BACKEND", "ortools")]).is_err());
    }
}
