//! Chain resolver backed by a Blockbook indexer.
//!
//! `GET {base}/api/v2/tx/{txid}` returns the transaction with per-output
//! `spent` flags. Output values are satoshi amounts encoded as strings.

use super::traits::{ChainResolver, CollateralResolution, OracleError, OracleResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Sentry node collateral: 100,000 SYS in satoshis.
pub const DEFAULT_COLLATERAL_SATS: u64 = 100_000 * 100_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct BlockbookTx {
    pub txid: String,
    #[serde(default)]
    pub vout: Vec<BlockbookOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockbookOutput {
    pub value: String,
    #[serde(default)]
    pub n: u32,
    #[serde(default)]
    pub spent: bool,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BlockbookErrorBody {
    error: String,
}

/// Blockbook REST client.
#[derive(Clone)]
pub struct BlockbookResolver {
    base_url: String,
    collateral_sats: u64,
    client: Client,
}

impl BlockbookResolver {
    pub fn new(base_url: &str, collateral_sats: u64, timeout: Duration) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::UpstreamUnavailable(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collateral_sats,
            client,
        })
    }

    fn tx_url(&self, transaction_id: &str) -> String {
        format!("{}/api/v2/tx/{}", self.base_url, transaction_id)
    }
}

#[async_trait]
impl ChainResolver for BlockbookResolver {
    async fn resolve_collateral(&self, transaction_id: &str) -> OracleResult<CollateralResolution> {
        let url = self.tx_url(transaction_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OracleError::UpstreamUnavailable(format!("blockbook request: {}", e)))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(CollateralResolution::not_found(transaction_id));
        }
        if status == StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            if is_not_found_body(&body) {
                return Ok(CollateralResolution::not_found(transaction_id));
            }
            return Err(OracleError::UpstreamUnavailable(format!(
                "blockbook returned {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(OracleError::UpstreamUnavailable(format!(
                "blockbook returned {}",
                status
            )));
        }

        let tx: BlockbookTx = resp
            .json()
            .await
            .map_err(|e| OracleError::UpstreamUnavailable(format!("blockbook body: {}", e)))?;

        Ok(resolution_from_tx(transaction_id, &tx, self.collateral_sats))
    }
}

/// Blockbook reports unknown transactions as HTTP 400 with an error body.
fn is_not_found_body(body: &str) -> bool {
    serde_json::from_str::<BlockbookErrorBody>(body)
        .map(|b| b.error.to_ascii_lowercase().contains("not found"))
        .unwrap_or(false)
}

/// Pick the collateral output out of a decoded transaction.
///
/// The first output whose value equals `collateral_sats` exactly is the
/// collateral. A transaction without such an output cannot be collateral.
pub fn resolution_from_tx(
    transaction_id: &str,
    tx: &BlockbookTx,
    collateral_sats: u64,
) -> CollateralResolution {
    let collateral = tx
        .vout
        .iter()
        .find(|out| out.value.trim().parse::<u64>().ok() == Some(collateral_sats));

    match collateral {
        None => CollateralResolution::not_found(transaction_id),
        Some(out) => {
            let address = out.addresses.first().cloned();
            if out.spent {
                CollateralResolution::spent(transaction_id, address)
            } else {
                match address {
                    Some(address) => CollateralResolution::unspent(transaction_id, &address),
                    None => CollateralResolution::not_found(transaction_id),
                }
            }
        }
    }
}
