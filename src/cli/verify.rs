use super::config::SnovConfig;
use super::service::{build_engine, init_logging};
use snov::gatekeeper::{ComplianceError, ResponseStatus, VerifiedResult, GRANT_FAILED_MESSAGE};
use tracing::warn;

/// Process exit code for a verification outcome: 0 SUCCESS, 1 FAIL, 2 ERROR.
pub fn exit_status(status: ResponseStatus) -> u8 {
    match status {
        ResponseStatus::Success => 0,
        ResponseStatus::Fail => 1,
        ResponseStatus::Error => 2,
    }
}

/// Run one verification from the command line
///
/// Same path as the chat `!verify` command: on success the record is
/// stored and the privilege callback fires. A failed grant is a FAIL, as
/// in chat; the stored record lets a repeated verify retry the grant.
pub async fn execute(
    transaction_id: String,
    requester_id: String,
    signature: String,
    config_path: Option<String>,
) -> Result<ResponseStatus, Box<dyn std::error::Error>> {
    let (config, _) = SnovConfig::load_or_create(config_path)?;
    init_logging(&config.logging.level);

    let engine = build_engine(&config).await?;
    let outcome = engine.verify(&transaction_id, &requester_id, &signature).await;

    let status = match &outcome {
        Ok(verified) => match engine
            .notifier()
            .on_verified(&verified.requester_id, &verified.address)
            .await
        {
            Ok(()) => ResponseStatus::Success,
            Err(e) => {
                warn!(requester = %verified.requester_id, error = %e, "granting channel access failed");
                println!("{}", render_grant_failure());
                return Ok(ResponseStatus::Fail);
            }
        },
        Err(e) => e.status(),
    };

    println!("{}", render_outcome(&outcome));
    Ok(status)
}

pub fn render_grant_failure() -> String {
    format!("{}: {}", ResponseStatus::Fail, GRANT_FAILED_MESSAGE)
}

pub fn render_outcome(outcome: &Result<VerifiedResult, ComplianceError>) -> String {
    match outcome {
        Ok(verified) => format!(
            "{}: {} verified as owner of {} (txid {})",
            ResponseStatus::Success,
            verified.requester_id,
            verified.address,
            verified.transaction_id
        ),
        Err(e) => format!("{}: {}", e.status(), e.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snov::chain::CollateralProblem;

    #[test]
    fn test_render_success() {
        let line = render_outcome(&Ok(VerifiedResult {
            requester_id: "alice".to_string(),
            transaction_id: "ab".repeat(32),
            address: "sys1qexample".to_string(),
            verified_at: 0,
        }));
        assert!(line.starts_with("SUCCESS: alice"));
        assert!(line.contains("sys1qexample"));
    }

    #[test]
    fn test_render_failures() {
        let fail = render_outcome(&Err(ComplianceError::CollateralInvalid(CollateralProblem::Spent)));
        assert!(fail.starts_with("FAIL: "));

        let error = render_outcome(&Err(ComplianceError::UpstreamUnavailable("503".to_string())));
        assert!(error.starts_with("ERROR: "));
        assert!(!error.contains("503"));

        assert_eq!(
            render_grant_failure(),
            "FAIL: Could not enable access to the channel."
        );
    }

    #[test]
    fn test_exit_status_is_distinct_per_outcome() {
        assert_eq!(exit_status(ResponseStatus::Success), 0);
        assert_eq!(exit_status(ResponseStatus::Fail), 1);
        assert_eq!(exit_status(ResponseStatus::Error), 2);
    }
}
