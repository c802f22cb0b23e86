//! Mock chat transport for testing.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(ServiceId),
    Group(GroupId),
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: Recipient,
    pub content: String,
}

#[derive(Default)]
struct MockState {
    sent_messages: Vec<SentMessage>,
    group_members: HashMap<GroupId, HashSet<ServiceId>>,
    incoming_messages: Vec<Message>,
    /// Scripted failures for membership changes, consumed front to back.
    membership_failures: VecDeque<ChatError>,
}

#[derive(Clone)]
pub struct MockChatTransport {
    state: Arc<Mutex<MockState>>,
    service_id: ServiceId,
}

impl MockChatTransport {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            service_id,
        }
    }

    pub fn add_incoming_message(&self, message: Message) {
        self.state.lock().unwrap().incoming_messages.push(message);
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    /// Direct messages sent to `recipient`, oldest first.
    pub fn sent_to(&self, recipient: &ServiceId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|m| m.recipient == Recipient::User(recipient.clone()))
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn sent_group_messages(&self, group: &GroupId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|m| m.recipient == Recipient::Group(group.clone()))
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn is_member(&self, group: &GroupId, member: &ServiceId) -> bool {
        self.state
            .lock()
            .unwrap()
            .group_members
            .get(group)
            .map(|members| members.contains(member))
            .unwrap_or(false)
    }

    /// Fail the next add/remove call with `error`.
    pub fn fail_next_membership_change(&self, error: ChatError) {
        self.state
            .lock()
            .unwrap()
            .membership_failures
            .push_back(error);
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn send_message(&self, recipient: &ServiceId, text: &str) -> ChatResult<()> {
        self.state.lock().unwrap().sent_messages.push(SentMessage {
            recipient: Recipient::User(recipient.clone()),
            content: text.to_string(),
        });
        Ok(())
    }

    async fn send_group_message(&self, group: &GroupId, text: &str) -> ChatResult<()> {
        self.state.lock().unwrap().sent_messages.push(SentMessage {
            recipient: Recipient::Group(group.clone()),
            content: text.to_string(),
        });
        Ok(())
    }

    async fn add_group_member(&self, group: &GroupId, member: &ServiceId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.membership_failures.pop_front() {
            return Err(error);
        }
        state
            .group_members
            .entry(group.clone())
            .or_default()
            .insert(member.clone());
        Ok(())
    }

    async fn remove_group_member(&self, group: &GroupId, member: &ServiceId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.membership_failures.pop_front() {
            return Err(error);
        }
        if let Some(members) = state.group_members.get_mut(group) {
            members.remove(member);
        }
        Ok(())
    }

    async fn receive_messages(&self) -> ChatResult<Vec<Message>> {
        Ok(std::mem::take(
            &mut self.state.lock().unwrap().incoming_messages,
        ))
    }

    fn service_id(&self) -> &ServiceId {
        &self.service_id
    }
}
