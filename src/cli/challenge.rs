use snov::gatekeeper::{ChallengeIssuer, SystemClock};
use std::sync::Arc;

/// Print the message a requester must sign for (txid, requester)
///
/// Needs no configuration: the challenge depends only on its inputs.
pub fn execute(transaction_id: &str, requester_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(transaction_id, requester_id)?);
    Ok(())
}

fn render(transaction_id: &str, requester_id: &str) -> Result<String, Box<dyn std::error::Error>> {
    let challenge = ChallengeIssuer::new(Arc::new(SystemClock)).issue(transaction_id, requester_id)?;
    Ok(challenge.message)
}
