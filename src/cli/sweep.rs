use super::config::SnovConfig;
use super::service::{build_engine, init_logging};
use snov::gatekeeper::SweepReport;

/// Run a single re-validation sweep now and print the report
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, _) = SnovConfig::load_or_create(config_path)?;
    init_logging(&config.logging.level);

    let engine = build_engine(&config).await?;
    let report = engine.sweep().await?;

    print!("{}", render_report(&report));
    Ok(())
}

pub fn render_report(report: &SweepReport) -> String {
    let mut out = format!("🔍 Sweep checked {} active record(s)\n", report.checked);

    if !report.removals_retried.is_empty() {
        out.push_str(&format!(
            "  Earlier revocations now removed from the channel: {}\n",
            report.removals_retried.len()
        ));
        for requester in &report.removals_retried {
            out.push_str(&format!("    🚪 {}\n", requester));
        }
    }

    out.push_str(&format!("  Revoked: {}\n", report.revoked.len()));
    for requester in &report.revoked {
        out.push_str(&format!("    ❌ {}\n", requester));
    }

    if !report.superseded.is_empty() {
        out.push_str(&format!(
            "  Re-verified during sweep: {}\n",
            report.superseded.len()
        ));
        for requester in &report.superseded {
            out.push_str(&format!("    🔁 {}\n", requester));
        }
    }

    out.push_str(&format!("  Errors (retried next sweep): {}\n", report.errors.len()));
    for failure in &report.errors {
        out.push_str(&format!("    ⚠️  {}: {}\n", failure.requester_id, failure.reason));
    }

    if !report.notify_failures.is_empty() {
        out.push_str(&format!(
            "  Revoked but still in the channel (retried next sweep): {}\n",
            report.notify_failures.len()
        ));
        for failure in &report.notify_failures {
            out.push_str(&format!("    🚨 {}: {}\n", failure.requester_id, failure.reason));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use snov::gatekeeper::SweepFailure;

    #[test]
    fn test_render_report() {
        let report = SweepReport {
            checked: 3,
            revoked: vec!["U1".to_string()],
            superseded: vec![],
            errors: vec![SweepFailure {
                requester_id: "U2".to_string(),
                reason: "timed out".to_string(),
            }],
            ..SweepReport::default()
        };

        let text = render_report(&report);
        assert!(text.contains("checked 3"));
        assert!(text.contains("Revoked: 1"));
        assert!(text.contains("U1"));
        assert!(text.contains("U2: timed out"));
        assert!(!text.contains("Re-verified"));
        assert!(!text.contains("still in the channel"));
    }

    #[test]
    fn test_render_report_shows_owed_removals() {
        let report = SweepReport {
            revoked: vec!["U1".to_string()],
            removals_retried: vec!["U0".to_string()],
            notify_failures: vec![SweepFailure {
                requester_id: "U1".to_string(),
                reason: "Transport error: unauthorized".to_string(),
            }],
            ..SweepReport::default()
        };

        let text = render_report(&report);
        assert!(text.contains("now removed from the channel: 1"));
        assert!(text.contains("U0"));
        assert!(text.contains("still in the channel (retried next sweep): 1"));
        assert!(text.contains("U1: Transport error: unauthorized"));
    }

    #[test]
    fn test_render_empty_report() {
        let text = render_report(&SweepReport::default());
        assert!(text.contains("checked 0"));
        assert!(text.contains("Errors (retried next sweep): 0"));
    }
}
