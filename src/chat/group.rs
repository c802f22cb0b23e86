//! Restricted-channel membership driven by verification events.
//!
//! Granting adds the requester to the group and announces the arrival.
//! Revoking removes them and tells them why by DM. Membership changes
//! retry transient network errors; messages are best effort.

use super::retry::{is_chat_error_retryable, retry_with_backoff};
use super::traits::{ChatTransport, GroupId, ServiceId};
use crate::gatekeeper::{NotifyError, PrivilegeNotifier};
use async_trait::async_trait;
use tracing::{info, warn};

const REVOKED_DM: &str = "Your sentry node verification has been revoked: the collateral \
     was spent or the node is no longer enabled. Your access to the channel has been removed.\n\
     Once your node is enabled again, verify with !getmessage and !verify.";

pub struct GroupNotifier<T: ChatTransport> {
    transport: T,
    group: GroupId,
}

impl<T: ChatTransport> GroupNotifier<T> {
    pub fn new(transport: T, group: GroupId) -> Self {
        Self { transport, group }
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }
}

#[async_trait]
impl<T: ChatTransport + 'static> PrivilegeNotifier for GroupNotifier<T> {
    async fn on_verified(&self, requester_id: &str, address: &str) -> Result<(), NotifyError> {
        let member = ServiceId(requester_id.to_string());

        retry_with_backoff(
            || {
                let transport = self.transport.clone();
                let group = self.group.clone();
                let member = member.clone();
                async move { transport.add_group_member(&group, &member).await }
            },
            is_chat_error_retryable,
        )
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(requester = requester_id, address, group = %self.group, "member added");

        let arrival = format!("Welcome {}, a verified sentry node owner!", requester_id);
        if let Err(e) = self.transport.send_group_message(&self.group, &arrival).await {
            warn!(group = %self.group, error = %e, "arrival announcement failed");
        }
        Ok(())
    }

    async fn on_revoked(&self, requester_id: &str) -> Result<(), NotifyError> {
        let member = ServiceId(requester_id.to_string());

        retry_with_backoff(
            || {
                let transport = self.transport.clone();
                let group = self.group.clone();
                let member = member.clone();
                async move { transport.remove_group_member(&group, &member).await }
            },
            is_chat_error_retryable,
        )
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(requester = requester_id, group = %self.group, "member removed");

        if let Err(e) = self.transport.send_message(&member, REVOKED_DM).await {
            warn!(requester = requester_id, error = %e, "revocation DM failed");
        }
        Ok(())
    }
}
