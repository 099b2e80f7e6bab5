//! Token supply API
//!
//! Aggregates on-chain balance data from two explorer APIs into the token's
//! total, circulating, and max supply, and serves the figures over HTTP with
//! time-bounded caching.
//!
//! # Supply arithmetic
//!
//! All arithmetic happens in base-unit integers:
//!
//! - `total = max_supply - burn_balance`
//! - `circulating = total - vesting_balance - project_balance`
//!
//! Conversion to a human-scale float is the very last step, once per figure.
//! Concurrent readers of an expired cache entry share one recomputation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod explorer;
pub mod server;
pub mod service;
pub mod supply;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
