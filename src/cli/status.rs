use super::config::SnovConfig;
use super::service::{init_logging, open_store};
use snov::gatekeeper::{Clock, SystemClock};
use snov::persistence::{RecordStore, VerificationRecord};
use std::time::Duration;

/// List stored verification records
///
/// Reads the database only; no oracle is contacted.
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, _) = SnovConfig::load_or_create(config_path)?;
    init_logging(&config.logging.level);

    let store = open_store(&config).await?;
    let records = store.list_all().await?;

    println!("📊 SNOV Status");
    println!("Database: {}", config.store.database_path.display());
    println!();
    print!("{}", render_records(&records, SystemClock.now()));

    Ok(())
}

pub fn render_records(records: &[VerificationRecord], now: u64) -> String {
    let active = records.iter().filter(|r| r.is_active()).count();
    let mut out = format!(
        "Records: {} ({} active, {} revoked)\n",
        records.len(),
        active,
        records.len() - active
    );

    for record in records {
        let icon = if record.is_active() { "✅" } else { "❌" };
        let pending = if record.removal_pending {
            ", channel removal pending"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {} {} [{}{}] {} txid {} verified {} ago\n",
            icon,
            record.requester_id,
            record.status,
            pending,
            record.address,
            record.transaction_id,
            format_age(now.saturating_sub(record.verified_at))
        ));
    }

    out
}

/// Coarse age ("3days 4h", "12m").
fn format_age(secs: u64) -> String {
    let rounded = if secs >= 86_400 {
        secs - secs % 3_600
    } else if secs >= 3_600 {
        secs - secs % 60
    } else {
        secs
    };
    humantime::format_duration(Duration::from_secs(rounded)).to_string()
}
