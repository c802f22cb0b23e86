//! Gatekeeper: collateral verification and continuous compliance.
//!
//! - Challenge: deterministic text bound to (txid, requester)
//! - Engine: one-shot verify, periodic sweep, operator revoke
//! - Scheduler: the sweep timer
//! - Notifier: privilege grant/withdraw callbacks

pub mod challenge;
pub mod clock;
pub mod engine;
pub mod notifier;
pub mod scheduler;

pub use challenge::{challenge_message, Challenge, ChallengeError, ChallengeIssuer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    ComplianceEngine, ComplianceError, ResponseStatus, SweepFailure, SweepPolicy, SweepReport,
    Sweeper, VerifiedResult,
};
pub use notifier::{
    LoggingNotifier, NotifyError, PrivilegeNotifier, RecordingNotifier, GRANT_FAILED_MESSAGE,
};
pub use scheduler::SweepScheduler;
