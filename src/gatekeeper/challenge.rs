//! Challenge issuance.
//!
//! The challenge text is a pure function of (transaction id, requester id):
//! a requester can regenerate it at any time, and a signature over it is
//! useless for any other transaction or requester because both appear
//! verbatim, each on its own line.

use super::clock::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Transaction ids are 32-byte hashes in hex.
pub const TXID_HEX_LEN: usize = 64;

/// Upper bound on requester id length (chat platform ids are far shorter).
pub const MAX_REQUESTER_ID_LEN: usize = 128;

const CHALLENGE_HEADER: &str = "Sentry node ownership verification";
const CHALLENGE_INSTRUCTIONS: &str =
    "Sign this exact message with the wallet that holds the collateral address.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Invalid transaction id: expected 64 hex characters")]
    InvalidTransactionId,

    #[error("Invalid requester id: {0}")]
    InvalidRequesterId(&'static str),
}

/// A challenge bound to one transaction and one requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Normalised (lower-case) transaction id.
    pub transaction_id: String,
    pub requester_id: String,
    /// Text the requester must sign.
    pub message: String,
    pub issued_at: u64,
}

/// Validate and normalise a transaction id.
pub fn normalize_transaction_id(transaction_id: &str) -> Result<String, ChallengeError> {
    let txid = transaction_id.trim();
    if txid.len() != TXID_HEX_LEN || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChallengeError::InvalidTransactionId);
    }
    Ok(txid.to_ascii_lowercase())
}

fn validate_requester_id(requester_id: &str) -> Result<(), ChallengeError> {
    if requester_id.trim().is_empty() {
        return Err(ChallengeError::InvalidRequesterId("empty"));
    }
    if requester_id.len() > MAX_REQUESTER_ID_LEN {
        return Err(ChallengeError::InvalidRequesterId("too long"));
    }
    if requester_id.chars().any(|c| c.is_control()) {
        return Err(ChallengeError::InvalidRequesterId("contains control characters"));
    }
    Ok(())
}

/// The challenge text for a validated (txid, requester) pair.
pub fn challenge_message(transaction_id: &str, requester_id: &str) -> String {
    format!(
        "{CHALLENGE_HEADER}\n{CHALLENGE_INSTRUCTIONS}\ntxid: {transaction_id}\nrequester: {requester_id}"
    )
}

#[derive(Clone)]
pub struct ChallengeIssuer {
    clock: Arc<dyn Clock>,
}

impl ChallengeIssuer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn issue(&self, transaction_id: &str, requester_id: &str) -> Result<Challenge, ChallengeError> {
        let transaction_id = normalize_transaction_id(transaction_id)?;
        validate_requester_id(requester_id)?;

        Ok(Challenge {
            message: challenge_message(&transaction_id, requester_id),
            transaction_id,
            requester_id: requester_id.to_string(),
            issued_at: self.clock.now(),
        })
    }
}
