//! Compliance engine: one-shot verification and the re-validation sweep.
//!
//! Per requester the lifecycle is Unverified -> Verified -> Revoked ->
//! Verified ... with no terminal state. `verify()` moves a requester into
//! Verified; `sweep()` moves Verified requesters whose collateral or node
//! standing lapsed into Revoked.
//!
//! Upstream outages are never treated as a negative answer: a record whose
//! check could not complete stays Active and is retried on the next sweep.
//!
//! A revocation is written first and the privilege withdrawn second. Until
//! the notifier confirms the withdrawal the record stays `removal_pending`,
//! and every sweep retries it before checking Active records.

use super::challenge::{ChallengeError, ChallengeIssuer};
use super::clock::{Clock, SystemClock};
use super::notifier::PrivilegeNotifier;
use crate::chain::{ChainResolver, CollateralProblem, OracleError, OracleResult, RegistryClient};
use crate::crypto::SignatureVerifier;
use crate::persistence::{RecordFence, RecordStore, StoreError, VerificationRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on one record's re-validation during a sweep.
pub const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of records re-validated concurrently.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Default bound on one privilege withdrawal (notifier call).
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// Tri-state outcome shown to requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    /// Definitive negative answer.
    Fail,
    /// Could not decide; try again later.
    Error,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success => write!(f, "SUCCESS"),
            ResponseStatus::Fail => write!(f, "FAIL"),
            ResponseStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ChallengeError),

    #[error("Collateral invalid: {0}")]
    CollateralInvalid(CollateralProblem),

    #[error("Address {0} is not an active sentry node")]
    NotActiveMember(String),

    #[error("Signature invalid")]
    SignatureInvalid,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Privilege change not confirmed: {0}")]
    NotifyFailed(String),
}

impl From<OracleError> for ComplianceError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::UpstreamUnavailable(reason) => ComplianceError::UpstreamUnavailable(reason),
        }
    }
}

impl ComplianceError {
    pub fn status(&self) -> ResponseStatus {
        match self {
            ComplianceError::UpstreamUnavailable(_) | ComplianceError::NotifyFailed(_) => {
                ResponseStatus::Error
            }
            ComplianceError::Store(StoreError::DuplicateConflict { .. }) => ResponseStatus::Fail,
            ComplianceError::Store(_) => ResponseStatus::Error,
            _ => ResponseStatus::Fail,
        }
    }

    /// Stable wording for requesters. Upstream and backend detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ComplianceError::InvalidInput(ChallengeError::InvalidTransactionId) => {
                "That is not a valid transaction id (expected 64 hexadecimal characters)."
            }
            ComplianceError::InvalidInput(ChallengeError::InvalidRequesterId(_)) => {
                "Your account id cannot be used for verification."
            }
            ComplianceError::CollateralInvalid(CollateralProblem::NotFound) => {
                "No sentry node collateral output was found in that transaction."
            }
            ComplianceError::CollateralInvalid(CollateralProblem::Spent) => {
                "The collateral output of that transaction has been spent."
            }
            ComplianceError::NotActiveMember(_) => {
                "The collateral address does not belong to an enabled sentry node."
            }
            ComplianceError::SignatureInvalid => "Signature verification failed.",
            ComplianceError::Store(StoreError::DuplicateConflict { .. }) => {
                "That collateral is already verified by another account."
            }
            ComplianceError::UpstreamUnavailable(_) | ComplianceError::Store(_) => {
                "Verification is temporarily unavailable. Please try again later."
            }
            ComplianceError::NotifyFailed(_) => {
                "Channel access could not be updated yet; it will be retried automatically."
            }
        }
    }
}

/// Successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedResult {
    pub requester_id: String,
    pub transaction_id: String,
    pub address: String,
    pub verified_at: u64,
}

/// A record whose re-validation could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub requester_id: String,
    pub reason: String,
}

/// Outcome of one sweep. Requester lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Active records examined.
    pub checked: usize,
    pub revoked: Vec<String>,
    /// Re-verified while being checked; left Active.
    pub superseded: Vec<String>,
    pub errors: Vec<SweepFailure>,
    /// Earlier revocations whose privilege withdrawal succeeded on retry.
    pub removals_retried: Vec<String>,
    /// Revoked, but the privilege withdrawal failed; retried next sweep.
    pub notify_failures: Vec<SweepFailure>,
}

/// Sweep tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub record_timeout: Duration,
    pub concurrency: usize,
    pub notify_timeout: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            record_timeout: DEFAULT_RECORD_TIMEOUT,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

/// Anything the scheduler can drive.
#[async_trait]
pub trait Sweeper: Send + Sync {
    async fn sweep(&self) -> Result<SweepReport, ComplianceError>;
}

/// Why a record lost standing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StandingLoss {
    Collateral(CollateralProblem),
    NotActiveMember(String),
}

impl fmt::Display for StandingLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StandingLoss::Collateral(problem) => write!(f, "{}", problem),
            StandingLoss::NotActiveMember(address) => {
                write!(f, "address {} no longer an active sentry node", address)
            }
        }
    }
}

enum RecordOutcome {
    InGoodStanding,
    /// Carries the withdrawal failure, if any.
    Revoked(Option<String>),
    Superseded,
    Failed(String),
}

pub struct ComplianceEngine<C, R, S>
where
    C: ChainResolver,
    R: RegistryClient,
    S: RecordStore,
{
    chain: Arc<C>,
    registry: Arc<R>,
    store: Arc<S>,
    issuer: ChallengeIssuer,
    verifier: SignatureVerifier,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn PrivilegeNotifier>,
    policy: SweepPolicy,
}

impl<C, R, S> ComplianceEngine<C, R, S>
where
    C: ChainResolver,
    R: RegistryClient,
    S: RecordStore,
{
    pub fn new(
        chain: Arc<C>,
        registry: Arc<R>,
        store: Arc<S>,
        verifier: SignatureVerifier,
        notifier: Arc<dyn PrivilegeNotifier>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            chain,
            registry,
            store,
            issuer: ChallengeIssuer::new(clock.clone()),
            verifier,
            clock,
            notifier,
            policy: SweepPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.issuer = ChallengeIssuer::new(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: SweepPolicy) -> Self {
        self.policy = SweepPolicy {
            concurrency: policy.concurrency.max(1),
            ..policy
        };
        self
    }

    pub fn issuer(&self) -> &ChallengeIssuer {
        &self.issuer
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn PrivilegeNotifier> {
        &self.notifier
    }

    /// Verify that `requester_id` controls the collateral of `transaction_id`.
    ///
    /// Steps short-circuit in order: challenge, collateral, registry,
    /// signature. The record is written before success is returned;
    /// granting the privilege is left to the caller.
    pub async fn verify(
        &self,
        transaction_id: &str,
        requester_id: &str,
        signature: &str,
    ) -> Result<VerifiedResult, ComplianceError> {
        let challenge = self.issuer.issue(transaction_id, requester_id)?;
        let txid = challenge.transaction_id.as_str();

        let resolution = self.chain.resolve_collateral(txid).await?;
        let address = resolution
            .usable_address()
            .map_err(ComplianceError::CollateralInvalid)?
            .to_string();

        if !self.registry.is_active_member(&address).await? {
            return Err(ComplianceError::NotActiveMember(address));
        }

        if !self.verifier.verify(&address, &challenge.message, signature) {
            debug!(requester = requester_id, txid, "signature rejected");
            return Err(ComplianceError::SignatureInvalid);
        }

        let verified_at = self.clock.now();
        let record =
            VerificationRecord::active(requester_id, txid, &address, signature.trim(), verified_at);
        self.store.upsert(record).await?;

        info!(requester = requester_id, txid, address = %address, "verification succeeded");

        Ok(VerifiedResult {
            requester_id: requester_id.to_string(),
            transaction_id: challenge.transaction_id,
            address,
            verified_at,
        })
    }

    /// Retry unconfirmed privilege withdrawals, then re-validate every
    /// Active record and revoke those that lost standing.
    pub async fn sweep(&self) -> Result<SweepReport, ComplianceError> {
        let pending = self.store.list_pending_removals().await?;
        let mut report = SweepReport::default();

        if !pending.is_empty() {
            info!(records = pending.len(), "retrying pending privilege withdrawals");
            let retries: Vec<(String, Result<(), String>)> = stream::iter(pending)
                .map(|record| async move {
                    let result = self.withdraw(&record.requester_id, &record.fence()).await;
                    (record.requester_id, result)
                })
                .buffer_unordered(self.policy.concurrency)
                .collect()
                .await;

            for (requester_id, result) in retries {
                match result {
                    Ok(()) => report.removals_retried.push(requester_id),
                    Err(reason) => report.notify_failures.push(SweepFailure {
                        requester_id,
                        reason,
                    }),
                }
            }
        }

        let records = self.store.list_active().await?;
        report.checked = records.len();
        info!(records = report.checked, "sweep started");

        let outcomes: Vec<(String, RecordOutcome)> = stream::iter(records)
            .map(|record| self.sweep_record(record))
            .buffer_unordered(self.policy.concurrency)
            .collect()
            .await;

        for (requester_id, outcome) in outcomes {
            match outcome {
                RecordOutcome::InGoodStanding => {}
                RecordOutcome::Revoked(notify_failure) => {
                    if let Some(reason) = notify_failure {
                        report.notify_failures.push(SweepFailure {
                            requester_id: requester_id.clone(),
                            reason,
                        });
                    }
                    report.revoked.push(requester_id);
                }
                RecordOutcome::Superseded => report.superseded.push(requester_id),
                RecordOutcome::Failed(reason) => report.errors.push(SweepFailure {
                    requester_id,
                    reason,
                }),
            }
        }
        report.revoked.sort();
        report.superseded.sort();
        report.removals_retried.sort();
        report
            .errors
            .sort_by(|a, b| a.requester_id.cmp(&b.requester_id));
        report
            .notify_failures
            .sort_by(|a, b| a.requester_id.cmp(&b.requester_id));

        info!(
            checked = report.checked,
            revoked = report.revoked.len(),
            superseded = report.superseded.len(),
            errors = report.errors.len(),
            removals_retried = report.removals_retried.len(),
            notify_failures = report.notify_failures.len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Operator revocation, bypassing the oracles.
    ///
    /// The record is revoked even when the withdrawal fails; the error then
    /// says so and the next sweep retries it.
    pub async fn revoke(&self, requester_id: &str) -> Result<(), ComplianceError> {
        let fence = self.store.mark_revoked(requester_id).await?;
        info!(requester = requester_id, "record revoked by operator");

        self.withdraw(requester_id, &fence)
            .await
            .map_err(ComplianceError::NotifyFailed)
    }

    /// Withdraw the privilege of a revoked record and clear its pending
    /// removal. The notifier call is bounded by `notify_timeout`.
    async fn withdraw(&self, requester_id: &str, fence: &RecordFence) -> Result<(), String> {
        let notified =
            tokio::time::timeout(self.policy.notify_timeout, self.notifier.on_revoked(requester_id)).await;
        let reason = match notified {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", self.policy.notify_timeout)),
        };
        if let Some(reason) = reason {
            warn!(requester = requester_id, reason = %reason, "privilege withdrawal failed; retried next sweep");
            return Err(reason);
        }

        match self.store.complete_removal(requester_id, fence).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(requester = requester_id, "record changed before withdrawal was confirmed");
                Ok(())
            }
            Err(e) => {
                warn!(requester = requester_id, error = %e, "withdrawal done but not recorded");
                Err(e.to_string())
            }
        }
    }

    async fn sweep_record(&self, record: VerificationRecord) -> (String, RecordOutcome) {
        let requester_id = record.requester_id.clone();

        let standing =
            match tokio::time::timeout(self.policy.record_timeout, self.check_standing(&record)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::UpstreamUnavailable(format!(
                    "timed out after {:?}",
                    self.policy.record_timeout
                ))),
            };

        let loss = match standing {
            Ok(None) => return (requester_id, RecordOutcome::InGoodStanding),
            Ok(Some(loss)) => loss,
            Err(OracleError::UpstreamUnavailable(reason)) => {
                warn!(requester = %requester_id, txid = %record.transaction_id, reason = %reason, "re-validation incomplete");
                return (requester_id, RecordOutcome::Failed(reason));
            }
        };

        match self.store.revoke_if_unchanged(&requester_id, &record.fence()).await {
            Ok(true) => {
                info!(requester = %requester_id, txid = %record.transaction_id, reason = %loss, "privilege revoked");
                let withdrawn = self.withdraw(&requester_id, &record.fence()).await;
                (requester_id, RecordOutcome::Revoked(withdrawn.err()))
            }
            Ok(false) => {
                info!(requester = %requester_id, "record re-verified during sweep; revocation skipped");
                (requester_id, RecordOutcome::Superseded)
            }
            Err(e) => {
                warn!(requester = %requester_id, error = %e, "revocation failed");
                (requester_id, RecordOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Steps 1 and 2 of verification for a stored record. `None` means the
    /// record is still in good standing.
    async fn check_standing(&self, record: &VerificationRecord) -> OracleResult<Option<StandingLoss>> {
        let resolution = self.chain.resolve_collateral(&record.transaction_id).await?;
        let address = match resolution.usable_address() {
            Ok(address) => address,
            Err(problem) => return Ok(Some(StandingLoss::Collateral(problem))),
        };

        if !self.registry.is_active_member(address).await? {
            return Ok(Some(StandingLoss::NotActiveMember(address.to_string())));
        }
        Ok(None)
    }
}

#[async_trait]
impl<C, R, S> Sweeper for ComplianceEngine<C, R, S>
where
    C: ChainResolver,
    R: RegistryClient,
    S: RecordStore,
{
    async fn sweep(&self) -> Result<SweepReport, ComplianceError> {
        ComplianceEngine::sweep(self).await
    }
}
