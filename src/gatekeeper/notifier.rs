//! Privilege callbacks.
//!
//! The engine never touches the chat platform. Whoever grants or withdraws
//! channel access implements `PrivilegeNotifier`; the daemon without a chat
//! transport uses `LoggingNotifier`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Reply when a verification was stored but access could not be granted.
pub const GRANT_FAILED_MESSAGE: &str = "Could not enable access to the channel.";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait PrivilegeNotifier: Send + Sync {
    /// Grant privilege after a successful verification.
    async fn on_verified(&self, requester_id: &str, address: &str) -> Result<(), NotifyError>;

    /// Withdraw privilege after a revocation.
    async fn on_revoked(&self, requester_id: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: PrivilegeNotifier + ?Sized> PrivilegeNotifier for Arc<T> {
    async fn on_verified(&self, requester_id: &str, address: &str) -> Result<(), NotifyError> {
        (**self).on_verified(requester_id, address).await
    }

    async fn on_revoked(&self, requester_id: &str) -> Result<(), NotifyError> {
        (**self).on_revoked(requester_id).await
    }
}

/// Records privilege changes in the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl PrivilegeNotifier for LoggingNotifier {
    async fn on_verified(&self, requester_id: &str, address: &str) -> Result<(), NotifyError> {
        info!(requester = requester_id, address, "privilege granted");
        Ok(())
    }

    async fn on_revoked(&self, requester_id: &str) -> Result<(), NotifyError> {
        info!(requester = requester_id, "privilege revoked");
        Ok(())
    }
}

/// Notifier that remembers every successful callback (tests).
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    verified: std::sync::Mutex<Vec<(String, String)>>,
    revoked: std::sync::Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every callback fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("notifier unavailable".to_string()));
        }
        Ok(())
    }

    pub fn verified(&self) -> Vec<(String, String)> {
        self.verified.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PrivilegeNotifier for RecordingNotifier {
    async fn on_verified(&self, requester_id: &str, address: &str) -> Result<(), NotifyError> {
        self.check_available()?;
        if let Ok(mut verified) = self.verified.lock() {
            verified.push((requester_id.to_string(), address.to_string()));
        }
        Ok(())
    }

    async fn on_revoked(&self, requester_id: &str) -> Result<(), NotifyError> {
        self.check_available()?;
        if let Ok(mut revoked) = self.revoked.lock() {
            revoked.push(requester_id.to_string());
        }
        Ok(())
    }
}
