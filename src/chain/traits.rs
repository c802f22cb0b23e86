//! Trait abstractions for the chain and registry oracles.
//!
//! Both are point-in-time, read-only views of external state. Neither holds
//! state of its own, so implementations must be safe for concurrent calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a transaction cannot serve as collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralProblem {
    /// Transaction unknown, or it has no output of the collateral value.
    NotFound,
    /// Collateral output already spent.
    Spent,
}

impl fmt::Display for CollateralProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "collateral output not found"),
            Self::Spent => write!(f, "collateral output spent"),
        }
    }
}

/// Result of resolving a transaction id to its collateral output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralResolution {
    pub transaction_id: String,
    pub address: Option<String>,
    pub spent: bool,
    pub found: bool,
}

impl CollateralResolution {
    pub fn not_found(transaction_id: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            address: None,
            spent: false,
            found: false,
        }
    }

    pub fn spent(transaction_id: &str, address: Option<String>) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            address,
            spent: true,
            found: true,
        }
    }

    pub fn unspent(transaction_id: &str, address: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            address: Some(address.to_string()),
            spent: false,
            found: true,
        }
    }

    /// The collateral address, if the output is usable as collateral.
    pub fn usable_address(&self) -> Result<&str, CollateralProblem> {
        if !self.found {
            return Err(CollateralProblem::NotFound);
        }
        if self.spent {
            return Err(CollateralProblem::Spent);
        }
        self.address.as_deref().ok_or(CollateralProblem::NotFound)
    }
}

/// Oracle errors.
///
/// Only infrastructure faults live here. A definitive negative answer is
/// a successful result (`found = false`, `spent = true`, `false`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Result type for oracle calls.
pub type OracleResult<T> = Result<T, OracleError>;

/// Resolves transaction ids to collateral outputs.
#[async_trait]
pub trait ChainResolver: Send + Sync {
    /// Resolve `transaction_id` to its collateral output. No caching.
    async fn resolve_collateral(&self, transaction_id: &str) -> OracleResult<CollateralResolution>;
}

/// Answers membership queries against the active-node registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Whether `address` currently operates an active node.
    async fn is_active_member(&self, address: &str) -> OracleResult<bool>;
}

#[async_trait]
impl<T: ChainResolver + ?Sized> ChainResolver for Arc<T> {
    async fn resolve_collateral(&self, transaction_id: &str) -> OracleResult<CollateralResolution> {
        (**self).resolve_collateral(transaction_id).await
    }
}

#[async_trait]
impl<T: RegistryClient + ?Sized> RegistryClient for Arc<T> {
    async fn is_active_member(&self, address: &str) -> OracleResult<bool> {
        (**self).is_active_member(address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_address_unspent() {
        let r = CollateralResolution::unspent("aa", "sys1qxyz");
        assert_eq!(r.usable_address(), Ok("sys1qxyz"));
    }

    #[test]
    fn test_usable_address_distinguishes_spent_and_missing() {
        assert_eq!(
            CollateralResolution::not_found("aa").usable_address(),
            Err(CollateralProblem::NotFound)
        );
        assert_eq!(
            CollateralResolution::spent("aa", Some("sys1qxyz".to_string())).usable_address(),
            Err(CollateralProblem::Spent)
        );
    }

    #[test]
    fn test_found_without_address_is_not_usable() {
        let r = CollateralResolution {
            transaction_id: "aa".to_string(),
            address: None,
            spent: false,
            found: true,
        };
        assert_eq!(r.usable_address(), Err(CollateralProblem::NotFound));
    }
}
