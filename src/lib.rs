//! SNOV - Sentry Node Owner Verification
//!
//! Grants access to a restricted chat channel to whoever proves, by
//! signing a challenge, that they control the key behind a sentry node
//! collateral, and keeps re-checking that the collateral is unspent and
//! the node enabled.
//!
//! - `gatekeeper`: challenge, compliance engine, sweep scheduler
//! - `chain`: collateral and node-registry oracles
//! - `crypto`: addresses and signed-message verification
//! - `persistence`: verification records
//! - `chat`: transport seam, command parsing, bot

pub mod chain;
pub mod chat;
pub mod crypto;
pub mod gatekeeper;
pub mod persistence;
