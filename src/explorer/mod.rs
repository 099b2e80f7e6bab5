//! Explorer query clients
//!
//! A [`ChainClient`] answers read-only token supply and balance queries
//! against one chain's explorer API. Amounts come back as arbitrary-precision
//! integers in the token's base units; no float ever crosses this boundary.

mod etherscan;

pub use etherscan::EtherscanClient;

use async_trait::async_trait;
use futures::future::try_join_all;
use num_bigint::BigUint;

use crate::Result;

/// Read-only balance and supply queries against one chain's explorer.
///
/// Implementations perform no retries; a timeout or connection failure is
/// reported as a transport error for the caller to handle.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Total supply of the token contract, in base units.
    async fn total_supply(&self, token: &str) -> Result<BigUint>;

    /// Balance of `holder` for the token contract, in base units.
    async fn balance(&self, token: &str, holder: &str) -> Result<BigUint>;

    /// Balances of several holders in one round trip where the explorer
    /// supports it. The result is ordered exactly like `holders`; an
    /// implementation must fail with a protocol error rather than return a
    /// reordered or truncated list.
    ///
    /// The default implementation fans out one [`ChainClient::balance`]
    /// call per holder concurrently, which trivially preserves order.
    async fn balances(&self, token: &str, holders: &[String]) -> Result<Vec<BigUint>> {
        try_join_all(holders.iter().map(|holder| self.balance(token, holder))).await
    }
}
