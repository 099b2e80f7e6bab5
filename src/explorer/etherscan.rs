//! Client for etherscan-family explorer APIs (etherscan.io, bscscan.com)
//!
//! Every endpoint shares one envelope shape: `{status, message, result}`
//! with `status == "1"` on success and the payload in `result`. Amounts are
//! decimal strings in token base units.

use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::ChainClient;
use crate::config::ExplorerConfig;
use crate::{Error, Result};

/// HTTP client for one etherscan-family explorer deployment
pub struct EtherscanClient {
    /// HTTP client (carries the per-request timeout)
    http: Client,
    /// Explorer API endpoint
    base_url: Url,
    /// API key appended to every request
    api_key: String,
}

/// Response envelope common to all etherscan-family endpoints
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    result: Value,
}

/// One entry of a batched balance response
#[derive(Debug, Deserialize)]
struct HolderBalance {
    account: String,
    balance: String,
}

impl EtherscanClient {
    /// Create a client for the given explorer endpoint
    pub fn new(config: &ExplorerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid explorer URL {:?}: {e}", config.base_url)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Issue one GET request and unwrap the response envelope
    async fn call(&self, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(self.base_url.clone())
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope = response.json().await?;

        if envelope.status != "1" {
            let detail = match envelope.result.as_str() {
                Some(s) => s.to_string(),
                None => envelope.result.to_string(),
            };
            return Err(Error::Transport(format!(
                "explorer replied {}: {detail}",
                envelope.message
            )));
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl ChainClient for EtherscanClient {
    async fn total_supply(&self, token: &str) -> Result<BigUint> {
        self.call(&[
            ("module", "stats"),
            ("action", "tokensupply"),
            ("contractaddress", token),
        ])
        .await
        .and_then(|v| parse_amount(&v))
        .map_err(|e| e.in_query("tokensupply", token))
    }

    async fn balance(&self, token: &str, holder: &str) -> Result<BigUint> {
        self.call(&[
            ("module", "account"),
            ("action", "tokenbalance"),
            ("contractaddress", token),
            ("address", holder),
            ("tag", "latest"),
        ])
        .await
        .and_then(|v| parse_amount(&v))
        .map_err(|e| e.in_query("tokenbalance", holder))
    }

    async fn balances(&self, token: &str, holders: &[String]) -> Result<Vec<BigUint>> {
        let joined = holders.join(",");
        self.call(&[
            ("module", "account"),
            ("action", "tokenbalancemulti"),
            ("contractaddress", token),
            ("address", &joined),
            ("tag", "latest"),
        ])
        .await
        .and_then(|v| serde_json::from_value::<Vec<HolderBalance>>(v).map_err(Error::from))
        .and_then(|entries| match_ordered(holders, entries))
        .map_err(|e| e.in_query("tokenbalancemulti", &joined))
    }
}

/// Parse a base-unit amount from the envelope's `result` field
fn parse_amount(value: &Value) -> Result<BigUint> {
    let raw = value
        .as_str()
        .ok_or_else(|| Error::Protocol(format!("expected string amount, got {value}")))?;
    BigUint::parse_bytes(raw.trim().as_bytes(), 10)
        .ok_or_else(|| Error::Protocol(format!("invalid base-unit amount {raw:?}")))
}

/// Validate a batched response against the requested holder list.
///
/// The explorer must return exactly one entry per requested holder, in
/// request order. Anything else aborts the whole query; we never match up
/// a short or shuffled list by guesswork.
fn match_ordered(holders: &[String], entries: Vec<HolderBalance>) -> Result<Vec<BigUint>> {
    if entries.len() != holders.len() {
        return Err(Error::Protocol(format!(
            "expected {} balances, explorer returned {}",
            holders.len(),
            entries.len()
        )));
    }

    holders
        .iter()
        .zip(entries)
        .map(|(holder, entry)| {
            if !entry.account.eq_ignore_ascii_case(holder) {
                return Err(Error::Protocol(format!(
                    "balance order mismatch: expected {holder}, got {}",
                    entry.account
                )));
            }
            BigUint::parse_bytes(entry.balance.trim().as_bytes(), 10).ok_or_else(|| {
                Error::Protocol(format!(
                    "invalid base-unit amount {:?} for {holder}",
                    entry.balance
                ))
            })
        })
        .collect()
}
