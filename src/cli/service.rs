//! Wiring from configuration to a running engine.

use super::config::SnovConfig;
use snov::chain::{BlockbookResolver, NodeRpcRegistry};
use snov::crypto::SignatureVerifier;
use snov::gatekeeper::{ComplianceEngine, LoggingNotifier};
use snov::persistence::SqliteRecordStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// The daemon's engine: Blockbook, node RPC and SQLite.
pub type DaemonEngine = ComplianceEngine<BlockbookResolver, NodeRpcRegistry, SqliteRecordStore>;

/// Install the global subscriber (stderr). `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second call (tests, repeated commands) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn open_store(config: &SnovConfig) -> Result<SqliteRecordStore, Box<dyn std::error::Error>> {
    Ok(SqliteRecordStore::open(&config.store.database_path).await?)
}

pub async fn build_engine(config: &SnovConfig) -> Result<DaemonEngine, Box<dyn std::error::Error>> {
    let params = config.network_params()?;

    let chain = BlockbookResolver::new(
        &config.chain.blockbook_url,
        config.chain.collateral_amount_sats,
        config.chain_timeout()?,
    )?;
    let registry = NodeRpcRegistry::new(
        &config.registry.rpc_url,
        config.registry.rpc_user.clone(),
        config.registry_password(),
        config.registry_timeout()?,
    )?;
    let store = open_store(config).await?;

    Ok(ComplianceEngine::new(
        Arc::new(chain),
        Arc::new(registry),
        Arc::new(store),
        SignatureVerifier::new(params),
        Arc::new(LoggingNotifier),
    )
    .with_policy(config.sweep_policy()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snov::persistence::{RecordStore, VerificationRecord};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_engine_from_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = SnovConfig::new(temp_dir.path().join("snov.db"));

        let engine = build_engine(&config).await.unwrap();
        engine
            .store()
            .upsert(VerificationRecord::active("u1", "t1", "a", "s", 1))
            .await
            .unwrap();

        let reopened = open_store(&config).await;
        assert!(reopened.is_ok());
        assert!(config.store.database_path.exists());
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging("debug");
        init_logging("not a level ===");
    }
}
