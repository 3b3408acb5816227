//! Prometheus-backed ledger metrics.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Ledger-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by the chain
/// registry as chains are created, blocks sealed and chains validated.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Chains created through the registry.
    pub chains_created: IntCounter,
    /// Blocks sealed and appended (genesis blocks included).
    pub blocks_sealed: IntCounter,
    /// Wall-clock time of one proof-of-work search, in seconds.
    pub mining_seconds: Histogram,
    /// Chain validations that found a failing block.
    pub validation_failures: IntCounter,
}

impl LedgerMetrics {
    /// Registers ledger metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let chains_created = IntCounter::with_opts(Opts::new(
            "ledger_chains_created_total",
            "Total number of entity chains created",
        ))?;
        registry.register(Box::new(chains_created.clone()))?;

        let blocks_sealed = IntCounter::with_opts(Opts::new(
            "ledger_blocks_sealed_total",
            "Total number of blocks mined and appended, genesis included",
        ))?;
        registry.register(Box::new(blocks_sealed.clone()))?;

        // Difficulty 4 usually lands in the 10ms-1s range; leave room for
        // larger targets.
        let mining_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mining_seconds",
                "Time spent in proof-of-work search per block in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(mining_seconds.clone()))?;

        let validation_failures = IntCounter::with_opts(Opts::new(
            "ledger_validation_failures_total",
            "Total number of chain validations that detected tampering or a broken link",
        ))?;
        registry.register(Box::new(validation_failures.clone()))?;

        Ok(Self {
            chains_created,
            blocks_sealed,
            mining_seconds,
            validation_failures,
        })
    }
}

/// Wrapper around a Prometheus registry and the ledger metrics.
///
/// This is the handle passed around in the process. It can be wrapped in
/// an `Arc` and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ledger: LedgerMetrics,
}

impl MetricsRegistry {
    /// Creates a fresh `bams`-prefixed registry with the ledger metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bams".to_string()), None)?;
        let ledger = LedgerMetrics::register(&registry)?;
        Ok(Self { registry, ledger })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = LedgerMetrics::register(&registry).expect("register metrics");

        metrics.chains_created.inc();
        metrics.blocks_sealed.inc_by(3);
        metrics.mining_seconds.observe(0.042);
        metrics.validation_failures.inc();

        assert_eq!(metrics.blocks_sealed.get(), 3);
        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn gather_text_uses_namespace_prefix() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.ledger.mining_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("bams_ledger_mining_seconds"));
    }
}
