//! Advisor configuration
//!
//! One explicit configuration object built from the environment and passed
//! to the engine and backend clients at construction. Nothing in the crate
//! reads configuration from process globals after startup.

use crate::backend::Provider;
use crate::error::AdvisorError;
use crate::Result;
use std::env;

/// Tunables for one advisor deployment.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Minimum overall evaluation score required to approve a report.
    pub approval_threshold: f64,
    /// Hard cap on Report → ReportEval iterations per run.
    pub max_report_iterations: u32,
    /// Months of ledger trend fed to the Collector.
    pub trend_months: u32,
    /// Top-K expense categories fed to the Collector.
    pub top_tags_limit: u32,
    /// Expense amount at or above which a transaction counts as large.
    pub large_transaction_threshold: f64,
    /// Per-request timeout for generative backend calls, in seconds.
    pub request_timeout_secs: u64,
    pub preferred_provider: Option<Provider>,
    pub google_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    /// SQLite database location; in-memory ledger when unset.
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            approval_threshold: 9.0,
            max_report_iterations: 3,
            trend_months: 3,
            top_tags_limit: 5,
            large_transaction_threshold: 10_000.0,
            request_timeout_secs: 60,
            preferred_provider: None,
            google_api_key: None,
            groq_api_key: None,
            database_url: None,
            port: 8080,
        }
    }
}

impl AdvisorConfig {
    /// Build a config from environment variables, falling back to defaults.
    /// Call `dotenv::dotenv().ok()` before this in binaries.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let preferred_provider = match env::var("PREFERRED_PROVIDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(Provider::parse(raw.trim()).ok_or_else(
                || {
                    AdvisorError::ConfigError(format!(
                        "unknown PREFERRED_PROVIDER '{}' (expected google or groq)",
                        raw
                    ))
                },
            )?),
            _ => None,
        };

        Ok(Self {
            approval_threshold: parse_var("APPROVAL_THRESHOLD", defaults.approval_threshold)?,
            max_report_iterations: parse_var(
                "MAX_REPORT_ITERATIONS",
                defaults.max_report_iterations,
            )?,
            trend_months: parse_var("TREND_MONTHS", defaults.trend_months)?,
            top_tags_limit: parse_var("TOP_TAGS_LIMIT", defaults.top_tags_limit)?,
            large_transaction_threshold: parse_var(
                "LARGE_TRANSACTION_THRESHOLD",
                defaults.large_transaction_threshold,
            )?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            preferred_provider,
            google_api_key: non_empty_var("GOOGLE_API_KEY"),
            groq_api_key: non_empty_var("GROQ_API_KEY"),
            database_url: non_empty_var("DATABASE_URL"),
            port: env::var("PORT")
                .or_else(|_| env::var("API_PORT"))
                .ok()
                .map(|raw| {
                    raw.parse().map_err(|_| {
                        AdvisorError::ConfigError(format!("invalid PORT value '{}'", raw))
                    })
                })
                .transpose()?
                .unwrap_or(defaults.port),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AdvisorError::ConfigError(format!("invalid {} value '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdvisorConfig::default();
        assert_eq!(config.approval_threshold, 9.0);
        assert_eq!(config.max_report_iterations, 3);
        assert_eq!(config.large_transaction_threshold, 10_000.0);
        assert!(config.preferred_provider.is_none());
    }
}
