use super::config::SnovConfig;
use super::service::{build_engine, init_logging};
use snov::gatekeeper::ComplianceError;

/// Revoke a requester's verification by hand
///
/// The record is kept (status `revoked`); the requester can verify again.
/// If the channel removal fails the record stays revoked and the next
/// sweep retries the removal; the command still fails so the operator sees it.
pub async fn execute(
    requester_id: String,
    config_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, _) = SnovConfig::load_or_create(config_path)?;
    init_logging(&config.logging.level);

    let engine = build_engine(&config).await?;
    match engine.revoke(&requester_id).await {
        Ok(()) => {
            println!("❌ Revoked verification for {}", requester_id);
            Ok(())
        }
        Err(ComplianceError::NotifyFailed(reason)) => Err(format!(
            "revoked {} but channel removal failed ({}); the next sweep retries it",
            requester_id, reason
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}
