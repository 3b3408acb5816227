//! API gateway configuration.
//!
//! Only the HTTP listen address lives here. Ledger settings come from
//! `bams_chain::LedgerConfig::from_env()`.

use std::net::SocketAddr;

pub const ENV_LISTEN_ADDR: &str = "BAMS_LISTEN_ADDR";
pub const ENV_PORT: &str = "PORT";

const DEFAULT_PORT: u16 = 5000;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// `BAMS_LISTEN_ADDR` wins over `PORT`. Unparseable values are logged
    /// and ignored.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(raw) = lookup(ENV_LISTEN_ADDR) {
            match raw.trim().parse::<SocketAddr>() {
                Ok(addr) => {
                    cfg.listen_addr = addr;
                    return cfg;
                }
                Err(_) => tracing::warn!(var = ENV_LISTEN_ADDR, value = %raw, "ignoring bad address"),
            }
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => cfg.listen_addr.set_port(port),
                Err(_) => tracing::warn!(var = ENV_PORT, value = %raw, "ignoring bad port"),
            }
        }

        cfg
    }
}
