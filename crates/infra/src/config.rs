//! Engine configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Knobs for the lifecycle engine. Independent of any UI/theme configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Parallel order writes per bulk batch.
    pub bulk_concurrency: usize,
    /// Length of the listing window when no date bound is given.
    pub default_window_days: u32,
    pub store_timeout: Duration,
    /// Fresh-read retries after a lost conditional write.
    pub write_conflict_retries: u32,
    pub store_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bulk_concurrency: 8,
            default_window_days: 7,
            store_timeout: Duration::from_millis(5000),
            write_conflict_retries: 5,
            store_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `SHOPDESK_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let retry_attempts = parse_or(
            &lookup,
            "SHOPDESK_STORE_RETRY_ATTEMPTS",
            defaults.store_retry.max_attempts,
            |_| true,
        );

        Self {
            bulk_concurrency: parse_or(&lookup, "SHOPDESK_BULK_CONCURRENCY", defaults.bulk_concurrency, |v| *v > 0),
            default_window_days: parse_or(&lookup, "SHOPDESK_DEFAULT_WINDOW_DAYS", defaults.default_window_days, |v| {
                *v > 0
            }),
            store_timeout: Duration::from_millis(parse_or(
                &lookup,
                "SHOPDESK_STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
                |v| *v > 0,
            )),
            write_conflict_retries: parse_or(
                &lookup,
                "SHOPDESK_WRITE_CONFLICT_RETRIES",
                defaults.write_conflict_retries,
                |_| true,
            ),
            store_retry: RetryPolicy {
                max_attempts: retry_attempts,
                ..defaults.store_retry
            },
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "invalid config value; using default");
            default
        }
    }
}
