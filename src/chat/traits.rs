//! Chat transport trait abstractions.
//!
//! The bot and the group notifier only talk to the platform through
//! `ChatTransport`; tests use `MockChatTransport`.

use async_trait::async_trait;
use std::fmt;

/// Platform account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Restricted group (channel) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a message was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    DirectMessage,
    Group(GroupId),
}

/// Inbound text message.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: ServiceId,
    pub source: MessageSource,
    pub text: String,
    pub timestamp: u64,
}

impl Message {
    pub fn direct(sender: &str, text: &str) -> Self {
        Self {
            sender: ServiceId(sender.to_string()),
            source: MessageSource::DirectMessage,
            text: text.to_string(),
            timestamp: 0,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Unauthorized operation")]
    Unauthorized,
}

#[async_trait]
pub trait ChatTransport: Clone + Send + Sync {
    /// Direct message to one account.
    async fn send_message(&self, recipient: &ServiceId, text: &str) -> ChatResult<()>;

    async fn send_group_message(&self, group: &GroupId, text: &str) -> ChatResult<()>;

    async fn add_group_member(&self, group: &GroupId, member: &ServiceId) -> ChatResult<()>;

    async fn remove_group_member(&self, group: &GroupId, member: &ServiceId) -> ChatResult<()>;

    /// Messages received since the last call.
    async fn receive_messages(&self) -> ChatResult<Vec<Message>>;

    /// The bot's own account.
    fn service_id(&self) -> &ServiceId;
}
