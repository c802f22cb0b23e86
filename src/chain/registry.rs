//! Active-node registry backed by a full node's JSON-RPC interface.
//!
//! `masternode_list` returns a map of collateral outpoint to node entry.
//! An address is an active member iff some entry has it as collateral
//! address and reports status `ENABLED`.

use super::traits::{OracleError, OracleResult, RegistryClient};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const ACTIVE_STATUS: &str = "ENABLED";

#[derive(Debug, Clone, Deserialize)]
pub struct NodeEntry {
    #[serde(default)]
    pub collateraladdress: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<HashMap<String, NodeEntry>>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC registry client.
#[derive(Clone)]
pub struct NodeRpcRegistry {
    url: String,
    user: Option<String>,
    password: Option<String>,
    client: Client,
}

impl NodeRpcRegistry {
    pub fn new(
        url: &str,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::UpstreamUnavailable(format!("http client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            user,
            password,
            client,
        })
    }

    async fn fetch_entries(&self) -> OracleResult<HashMap<String, NodeEntry>> {
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": "snov",
            "method": "masternode_list",
            "params": [],
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| OracleError::UpstreamUnavailable(format!("registry request: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::UpstreamUnavailable(format!("registry body: {}", e)))?;

        // Node RPC reports method errors as HTTP 500 with a JSON error body
        let parsed: RpcResponse = serde_json::from_str(&text).map_err(|e| {
            OracleError::UpstreamUnavailable(format!("registry returned {}: {}", status, e))
        })?;

        parse_entries(parsed)
    }
}

#[async_trait]
impl RegistryClient for NodeRpcRegistry {
    async fn is_active_member(&self, address: &str) -> OracleResult<bool> {
        let entries = self.fetch_entries().await?;
        Ok(registry_contains(&entries, address))
    }
}

fn parse_entries(resp: RpcResponse) -> OracleResult<HashMap<String, NodeEntry>> {
    if let Some(err) = resp.error {
        return Err(OracleError::UpstreamUnavailable(format!(
            "registry rpc error {}: {}",
            err.code, err.message
        )));
    }
    resp.result
        .ok_or_else(|| OracleError::UpstreamUnavailable("registry rpc returned no result".to_string()))
}

/// Exact-match membership over a registry snapshot.
pub fn registry_contains(entries: &HashMap<String, NodeEntry>, address: &str) -> bool {
    entries.values().any(|entry| {
        entry.collateraladdress.as_deref() == Some(address)
            && entry.status.as_deref() == Some(ACTIVE_STATUS)
    })
}
