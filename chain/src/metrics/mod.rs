//! Metrics and instrumentation for the ledger.
//!
//! This module defines Prometheus-compatible counters and histograms for
//! chain creation, block sealing and validation. The text exposition is
//! produced by [`MetricsRegistry::gather_text`]; serving it over HTTP is
//! left to the embedding binary (the API gateway mounts it on `/metrics`).
//!
//! Typical usage:
//!
//! ```ignore
//! use std::sync::Arc;
//! use bams_chain::metrics::MetricsRegistry;
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! registry.ledger.blocks_sealed.inc();
//! let body = registry.gather_text();
//! ```

pub mod prometheus;

pub use self::prometheus::{LedgerMetrics, MetricsRegistry};
