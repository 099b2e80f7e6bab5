//! Supply aggregation
//!
//! Fans out the explorer queries for one computation cycle concurrently,
//! joins them, and derives the supply figures with exact integer arithmetic.
//! Only the finished figures are converted to floats, once each, for display.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{CheckedSub, ToPrimitive};
use serde::Serialize;
use tracing::debug;

use crate::config::TokenConfig;
use crate::explorer::ChainClient;
use crate::{Error, Result};

/// One consistent snapshot of the token's supply figures, in human scale.
///
/// All three fields come from the same set of explorer queries; a report is
/// produced whole or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupplyReport {
    /// Max supply minus burned tokens
    pub total: f64,
    /// Total supply minus vesting and project balances
    pub circulating: f64,
    /// Supply reported by the token contract
    pub max: f64,
}

/// Computes supply reports from two chains' explorers.
///
/// The token contract, project wallet, and burn address live on the BSC
/// chain; the vesting contract is queried on the ETH chain.
pub struct Aggregator {
    bsc: Arc<dyn ChainClient>,
    eth: Arc<dyn ChainClient>,
    token: TokenConfig,
}

impl Aggregator {
    /// Create an aggregator over the given explorer clients
    pub fn new(bsc: Arc<dyn ChainClient>, eth: Arc<dyn ChainClient>, token: TokenConfig) -> Self {
        Self { bsc, eth, token }
    }

    /// Run one aggregation cycle and derive a [`SupplyReport`].
    ///
    /// All explorer queries run concurrently and all must succeed; a single
    /// failed query discards the other results and fails the whole cycle.
    /// No retries happen here — retry policy belongs to the caller.
    pub async fn compute(&self) -> Result<SupplyReport> {
        let token = &self.token;

        let (max_supply, burn, vesting, project) = if token.batch_balances {
            let holders = [token.burn_address.clone(), token.project_wallet.clone()];
            let (max_supply, held, vesting) = tokio::try_join!(
                self.bsc.total_supply(&token.contract),
                self.bsc.balances(&token.contract, &holders),
                self.eth.balance(&token.contract, &token.vesting_contract),
            )?;
            let [burn, project]: [BigUint; 2] = held.try_into().map_err(|held: Vec<BigUint>| {
                Error::Protocol(format!("expected 2 batched balances, got {}", held.len()))
            })?;
            (max_supply, burn, vesting, project)
        } else {
            tokio::try_join!(
                self.bsc.total_supply(&token.contract),
                self.bsc.balance(&token.contract, &token.burn_address),
                self.eth.balance(&token.contract, &token.vesting_contract),
                self.bsc.balance(&token.contract, &token.project_wallet),
            )?
        };

        // Total supply = max supply minus burnt tokens
        let total = max_supply.checked_sub(&burn).ok_or_else(|| {
            Error::Computation(format!(
                "burn balance {burn} exceeds max supply {max_supply}"
            ))
        })?;

        // Circulating supply = total supply minus vesting contract minus
        // project wallet
        let reserved = &vesting + &project;
        let circulating = total.checked_sub(&reserved).ok_or_else(|| {
            Error::Computation(format!(
                "vesting {vesting} + project {project} exceed total supply {total}"
            ))
        })?;

        debug!(
            %max_supply, %burn, %vesting, %project, %total, %circulating,
            "Computed supply figures"
        );

        Ok(SupplyReport {
            total: to_scaled(&total, token.decimals),
            circulating: to_scaled(&circulating, token.decimals),
            max: to_scaled(&max_supply, token.decimals),
        })
    }
}

/// Convert a base-unit amount to human scale by dividing by `10^decimals`.
///
/// Splits into integer quotient and remainder first so the only lossy step
/// is the final float conversion of each part.
fn to_scaled(amount: &BigUint, decimals: u32) -> f64 {
    let divisor = BigUint::from(10u8).pow(decimals);
    let whole = amount / &divisor;
    let frac = amount % &divisor;
    whole.to_f64().unwrap_or(f64::INFINITY)
        + frac.to_f64().unwrap_or(0.0) / divisor.to_f64().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Explorer stub: fixed total supply plus per-holder balances.
    /// Holders absent from the map fail with a transport error, which
    /// doubles as the "query timed out" case.
    #[derive(Default)]
    struct FakeChain {
        total_supply: Option<BigUint>,
        balances: HashMap<String, BigUint>,
        /// Drop the last entry of batched replies (misbehaving explorer)
        truncate_batches: bool,
        balance_calls: AtomicUsize,
        batched_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn total_supply(&self, token: &str) -> Result<BigUint> {
            self.total_supply
                .clone()
                .ok_or_else(|| Error::Transport(format!("tokensupply({token}): boom")))
        }

        async fn balance(&self, _token: &str, holder: &str) -> Result<BigUint> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            self.balances
                .get(holder)
                .cloned()
                .ok_or_else(|| Error::Transport(format!("tokenbalance({holder}): boom")))
        }

        async fn balances(&self, _token: &str, holders: &[String]) -> Result<Vec<BigUint>> {
            self.batched_calls.fetch_add(1, Ordering::SeqCst);
            let mut amounts = holders
                .iter()
                .map(|holder| {
                    self.balances.get(holder).cloned().ok_or_else(|| {
                        Error::Transport(format!("tokenbalance({holder}): boom"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if self.truncate_batches {
                amounts.pop();
            }
            Ok(amounts)
        }
    }

    fn tokens(n: u64) -> BigUint {
        BigUint::from(n) * BigUint::from(10u8).pow(18)
    }

    fn chains(token: &TokenConfig) -> (FakeChain, FakeChain) {
        let bsc = FakeChain {
            total_supply: Some(tokens(1_000_000)),
            balances: HashMap::from([
                (token.burn_address.clone(), tokens(100_000)),
                (token.project_wallet.clone(), tokens(50_000)),
            ]),
            ..FakeChain::default()
        };
        let eth = FakeChain {
            balances: HashMap::from([(token.vesting_contract.clone(), tokens(200_000))]),
            ..FakeChain::default()
        };
        (bsc, eth)
    }

    fn aggregator(bsc: FakeChain, eth: FakeChain, token: TokenConfig) -> Aggregator {
        Aggregator::new(Arc::new(bsc), Arc::new(eth), token)
    }

    #[tokio::test]
    async fn derives_supplies_from_individual_queries() {
        let token = TokenConfig::default();
        let (bsc, eth) = chains(&token);

        let report = aggregator(bsc, eth, token).compute().await.expect("compute");

        assert_eq!(report.total, 900_000.0);
        assert_eq!(report.circulating, 650_000.0);
        assert_eq!(report.max, 1_000_000.0);
    }

    #[tokio::test]
    async fn batched_strategy_matches_individual_strategy() {
        let token = TokenConfig {
            batch_balances: true,
            ..TokenConfig::default()
        };
        let (bsc, eth) = chains(&token);
        let aggregator = aggregator(bsc, eth, token);

        let report = aggregator.compute().await.expect("compute");

        assert_eq!(report.total, 900_000.0);
        assert_eq!(report.circulating, 650_000.0);
        assert_eq!(report.max, 1_000_000.0);
    }

    #[tokio::test]
    async fn batched_strategy_uses_one_balance_round_trip() {
        let token = TokenConfig {
            batch_balances: true,
            ..TokenConfig::default()
        };
        let (bsc, eth) = chains(&token);
        let (bsc, eth) = (Arc::new(bsc), Arc::new(eth));
        let aggregator = Aggregator::new(
            Arc::clone(&bsc) as Arc<dyn ChainClient>,
            Arc::clone(&eth) as Arc<dyn ChainClient>,
            token,
        );

        aggregator.compute().await.expect("compute");

        assert_eq!(bsc.batched_calls.load(Ordering::SeqCst), 1);
        assert_eq!(bsc.balance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(eth.balance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failed_query_fails_the_whole_cycle() {
        let token = TokenConfig::default();
        let (bsc, _) = chains(&token);
        // Vesting query has no stubbed balance: the ETH-side call fails
        // while the three BSC-side queries succeed
        let eth = FakeChain::default();

        let err = aggregator(bsc, eth, token.clone())
            .compute()
            .await
            .expect_err("cycle must fail");

        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains(&token.vesting_contract));
    }

    #[tokio::test]
    async fn burn_exceeding_max_supply_is_a_computation_error() {
        let token = TokenConfig::default();
        let (mut bsc, eth) = chains(&token);
        bsc.total_supply = Some(tokens(50_000));

        let err = aggregator(bsc, eth, token)
            .compute()
            .await
            .expect_err("underflow must fail");

        assert!(matches!(err, Error::Computation(_)));
        assert!(err.to_string().contains("exceeds max supply"));
    }

    #[tokio::test]
    async fn reserves_exceeding_total_are_a_computation_error() {
        let token = TokenConfig::default();
        let (bsc, mut eth) = chains(&token);
        eth.balances
            .insert(token.vesting_contract.clone(), tokens(900_000));

        let err = aggregator(bsc, eth, token)
            .compute()
            .await
            .expect_err("underflow must fail");

        assert!(matches!(err, Error::Computation(_)));
        assert!(err.to_string().contains("exceed total supply"));
    }

    #[tokio::test]
    async fn truncated_batched_reply_is_a_protocol_error() {
        let token = TokenConfig {
            batch_balances: true,
            ..TokenConfig::default()
        };
        let (mut bsc, eth) = chains(&token);
        bsc.truncate_batches = true;

        let err = aggregator(bsc, eth, token)
            .compute()
            .await
            .expect_err("short batch must fail");

        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("expected 2 batched balances"));
    }

    #[test]
    fn to_scaled_keeps_fractional_part() {
        // 1234.5 tokens in base units
        let amount = BigUint::from(12_345u32) * BigUint::from(10u8).pow(17);
        assert_eq!(to_scaled(&amount, 18), 1234.5);
    }

    #[test]
    fn to_scaled_with_zero_decimals_is_identity() {
        assert_eq!(to_scaled(&BigUint::from(42u8), 0), 42.0);
    }
}
