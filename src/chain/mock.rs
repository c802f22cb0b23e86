//! Mock chain and registry oracles for testing.
//!
//! Outcomes are scripted per transaction id / address; every call is
//! counted so tests can assert short-circuiting.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock chain resolver.
#[derive(Clone, Default)]
pub struct MockChainResolver {
    state: Arc<Mutex<ChainState>>,
}

#[derive(Default)]
struct ChainState {
    outcomes: HashMap<String, OracleResult<CollateralResolution>>,
    delay: Option<Duration>,
    calls: usize,
}

impl MockChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `transaction_id` as an unspent collateral paying `address`.
    pub fn set_unspent(&self, transaction_id: &str, address: &str) {
        self.set(
            transaction_id,
            Ok(CollateralResolution::unspent(transaction_id, address)),
        );
    }

    pub fn set_spent(&self, transaction_id: &str, address: &str) {
        self.set(
            transaction_id,
            Ok(CollateralResolution::spent(
                transaction_id,
                Some(address.to_string()),
            )),
        );
    }

    pub fn set_unavailable(&self, transaction_id: &str) {
        self.set(
            transaction_id,
            Err(OracleError::UpstreamUnavailable("mock outage".to_string())),
        );
    }

    /// Delay every response (for timeout tests).
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn set(&self, transaction_id: &str, outcome: OracleResult<CollateralResolution>) {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert(transaction_id.to_string(), outcome);
    }
}

#[async_trait]
impl ChainResolver for MockChainResolver {
    async fn resolve_collateral(&self, transaction_id: &str) -> OracleResult<CollateralResolution> {
        let (outcome, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            let outcome = state
                .outcomes
                .get(transaction_id)
                .cloned()
                .unwrap_or_else(|| Ok(CollateralResolution::not_found(transaction_id)));
            (outcome, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

/// Mock active-node registry.
#[derive(Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

#[derive(Default)]
struct RegistryState {
    members: HashSet<String>,
    unavailable: bool,
    calls: usize,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, address: &str) {
        self.state
            .lock()
            .unwrap()
            .members
            .insert(address.to_string());
    }

    pub fn remove_member(&self, address: &str) {
        self.state.lock().unwrap().members.remove(address);
    }

    /// Make every query fail with `UpstreamUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn is_active_member(&self, address: &str) -> OracleResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.unavailable {
            return Err(OracleError::UpstreamUnavailable(
                "mock registry outage".to_string(),
            ));
        }
        Ok(state.members.contains(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_transaction_is_not_found() {
        let chain = MockChainResolver::new();
        let r = chain.resolve_collateral("ff").await.unwrap();
        assert!(!r.found);
        assert_eq!(chain.calls(), 1);
    }

    #[tokio::test]
    async fn test_registry_outage() {
        let registry = MockRegistry::new();
        registry.add_member("A1");
        assert!(registry.is_active_member("A1").await.unwrap());

        registry.set_unavailable(true);
        assert!(registry.is_active_member("A1").await.is_err());
        assert_eq!(registry.calls(), 2);
    }
}
