//! Top-level configuration for a ledger.
//!
//! This module aggregates configuration for:
//!
//! - chain policy (`ChainPolicy`: proof-of-work difficulty),
//! - the mining pool (`MiningConfig`: worker bound, attempt cap, timeout),
//! - metrics collection (`MetricsConfig`).
//!
//! Binaries start from [`LedgerConfig::default`] and layer environment
//! overrides on top with [`LedgerConfig::from_env`].

use std::str::FromStr;
use std::time::Duration;

use crate::ledger::{ChainPolicy, DIFFICULTY_RANGE};
use crate::mining::MiningConfig;

/// Configuration for Prometheus metrics collection.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether `/metrics` should expose the registry.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration for a [`ChainRegistry`](crate::ChainRegistry).
#[derive(Clone, Debug, Default)]
pub struct LedgerConfig {
    pub policy: ChainPolicy,
    pub mining: MiningConfig,
    pub metrics: MetricsConfig,
}

pub const ENV_DIFFICULTY: &str = "BAMS_DIFFICULTY";
pub const ENV_MINING_WORKERS: &str = "BAMS_MINING_WORKERS";
pub const ENV_MINING_MAX_ATTEMPTS: &str = "BAMS_MINING_MAX_ATTEMPTS";
pub const ENV_MINING_TIMEOUT_MS: &str = "BAMS_MINING_TIMEOUT_MS";
pub const ENV_METRICS_ENABLED: &str = "BAMS_METRICS_ENABLED";

impl LedgerConfig {
    /// Defaults overridden by `BAMS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Like [`LedgerConfig::from_env`] but reads variables through
    /// `lookup`. Unparseable values are logged and ignored.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(difficulty) = parse_var::<u32>(&lookup, ENV_DIFFICULTY) {
            match ChainPolicy::with_difficulty(difficulty) {
                Some(policy) => cfg.policy = policy,
                None => tracing::warn!(
                    var = ENV_DIFFICULTY,
                    difficulty,
                    "ignoring difficulty outside {}..={}",
                    DIFFICULTY_RANGE.start(),
                    DIFFICULTY_RANGE.end()
                ),
            }
        }
        if let Some(workers) = parse_var::<usize>(&lookup, ENV_MINING_WORKERS) {
            if workers == 0 {
                tracing::warn!(var = ENV_MINING_WORKERS, "ignoring zero worker count");
            } else {
                cfg.mining.workers = workers;
            }
        }
        if let Some(max) = parse_var::<u64>(&lookup, ENV_MINING_MAX_ATTEMPTS) {
            cfg.mining.max_attempts = Some(max);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_MINING_TIMEOUT_MS) {
            cfg.mining.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, ENV_METRICS_ENABLED) {
            cfg.metrics.enabled = enabled;
        }

        cfg
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.policy.difficulty, 4);
        assert!(cfg.mining.workers >= 1);
        assert_eq!(cfg.mining.max_attempts, None);
        assert_eq!(cfg.mining.timeout, None);
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = LedgerConfig::from_env_with(env(&[
            (ENV_DIFFICULTY, "2"),
            (ENV_MINING_WORKERS, "3"),
            (ENV_MINING_MAX_ATTEMPTS, "1000"),
            (ENV_MINING_TIMEOUT_MS, "250"),
            (ENV_METRICS_ENABLED, "false"),
        ]));
        assert_eq!(cfg.policy.difficulty, 2);
        assert_eq!(cfg.mining.workers, 3);
        assert_eq!(cfg.mining.max_attempts, Some(1000));
        assert_eq!(cfg.mining.timeout, Some(Duration::from_millis(250)));
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn out_of_range_difficulty_is_ignored() {
        for raw in ["0", "65", "4000000000"] {
            let cfg = LedgerConfig::from_env_with(env(&[(ENV_DIFFICULTY, raw)]));
            assert_eq!(cfg.policy.difficulty, 4, "BAMS_DIFFICULTY={raw}");
        }
        let cfg = LedgerConfig::from_env_with(env(&[(ENV_DIFFICULTY, "64")]));
        assert_eq!(cfg.policy.difficulty, 64);
    }

    #[test]
    fn garbage_is_ignored() {
        let cfg = LedgerConfig::from_env_with(env(&[
            (ENV_DIFFICULTY, "hard"),
            (ENV_MINING_WORKERS, "0"),
        ]));
        let defaults = LedgerConfig::default();
        assert_eq!(cfg.policy.difficulty, defaults.policy.difficulty);
        assert_eq!(cfg.mining.workers, defaults.mining.workers);
    }
}
