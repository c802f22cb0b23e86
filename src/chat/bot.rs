//! Verification bot
//!
//! - Answers direct messages only; group chatter and its own messages are ignored
//! - `!getmessage` issues the challenge for (txid, sender)
//! - `!verify` runs the compliance engine, then grants channel access
//!   through the engine's privilege notifier
//! - Each message is handled on its own task, so a grant stuck in retry
//!   never delays anyone else's reply

use super::commands::{help_text, parse_command, Command};
use super::traits::*;
use crate::chain::{ChainResolver, RegistryClient};
use crate::gatekeeper::{ComplianceEngine, ComplianceError, ResponseStatus, GRANT_FAILED_MESSAGE};
use crate::persistence::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How often the transport is polled for new messages.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const VERIFIED_REPLY: &str = "Congratulations, you are now verified and can access the \
     sentry node owners channel! Thank you for supporting Syscoin!";
const UNKNOWN_REPLY: &str = "Unrecognised command. Send !help for usage.";

/// Render a reply with its status marker.
pub fn format_reply(status: ResponseStatus, text: &str) -> String {
    let icon = match status {
        ResponseStatus::Success => "✅",
        ResponseStatus::Fail => "❌",
        ResponseStatus::Error => "⚠️",
    };
    format!("{} {}: {}", icon, status, text)
}

pub struct ComplianceBot<T, C, R, S>
where
    T: ChatTransport,
    C: ChainResolver,
    R: RegistryClient,
    S: RecordStore,
{
    transport: T,
    engine: Arc<ComplianceEngine<C, R, S>>,
}

impl<T, C, R, S> ComplianceBot<T, C, R, S>
where
    T: ChatTransport,
    C: ChainResolver,
    R: RegistryClient,
    S: RecordStore,
{
    pub fn new(transport: T, engine: Arc<ComplianceEngine<C, R, S>>) -> Self {
        Self { transport, engine }
    }

    pub async fn handle_message(&self, message: Message) -> ChatResult<()> {
        if &message.sender == self.transport.service_id() {
            return Ok(());
        }
        if !matches!(message.source, MessageSource::DirectMessage) {
            debug!(sender = %message.sender, "ignoring group message");
            return Ok(());
        }

        let sender = &message.sender;
        let command = match parse_command(&message.text) {
            Ok(command) => command,
            Err(e) => {
                return self.reply(sender, ResponseStatus::Fail, &e.to_string()).await;
            }
        };

        match command {
            Command::Help => self.reply(sender, ResponseStatus::Success, &help_text()).await,
            Command::GetChallenge { transaction_id } => {
                self.handle_get_challenge(sender, &transaction_id).await
            }
            Command::Verify {
                transaction_id,
                signature,
            } => self.handle_verify(sender, &transaction_id, &signature).await,
            Command::Unknown(_) => self.reply(sender, ResponseStatus::Fail, UNKNOWN_REPLY).await,
        }
    }

    async fn handle_get_challenge(&self, sender: &ServiceId, transaction_id: &str) -> ChatResult<()> {
        match self.engine.issuer().issue(transaction_id, &sender.0) {
            Ok(challenge) => {
                let text = format!(
                    "Sign the following message with the wallet that holds the collateral \
                     address, then send !verify {} <signature>:\n\n{}",
                    challenge.transaction_id, challenge.message
                );
                self.reply(sender, ResponseStatus::Success, &text).await
            }
            Err(e) => {
                let e = ComplianceError::from(e);
                self.reply(sender, e.status(), e.user_message()).await
            }
        }
    }

    async fn handle_verify(
        &self,
        sender: &ServiceId,
        transaction_id: &str,
        signature: &str,
    ) -> ChatResult<()> {
        let verified = match self.engine.verify(transaction_id, &sender.0, signature).await {
            Ok(verified) => verified,
            Err(e) => {
                info!(sender = %sender, txid = transaction_id, error = %e, "verification failed");
                return self.reply(sender, e.status(), e.user_message()).await;
            }
        };

        match self
            .engine
            .notifier()
            .on_verified(&verified.requester_id, &verified.address)
            .await
        {
            Ok(()) => self.reply(sender, ResponseStatus::Success, VERIFIED_REPLY).await,
            Err(e) => {
                warn!(sender = %sender, error = %e, "granting channel access failed");
                self.reply(sender, ResponseStatus::Fail, GRANT_FAILED_MESSAGE).await
            }
        }
    }

    async fn reply(&self, recipient: &ServiceId, status: ResponseStatus, text: &str) -> ChatResult<()> {
        self.transport
            .send_message(recipient, &format_reply(status, text))
            .await
    }
}

impl<T, C, R, S> ComplianceBot<T, C, R, S>
where
    T: ChatTransport + 'static,
    C: ChainResolver + 'static,
    R: RegistryClient + 'static,
    S: RecordStore + 'static,
{
    /// Poll for messages until `shutdown` flips to true.
    ///
    /// Handlers still running at shutdown are aborted. A stored record
    /// whose grant was cut short is granted again on the next `!verify`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> ChatResult<()> {
        let mut poll = tokio::time::interval(POLL_INTERVAL);
        let mut in_flight = JoinSet::new();
        info!(bot = %self.transport.service_id(), "bot started");

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    while let Some(finished) = in_flight.try_join_next() {
                        if let Err(e) = finished {
                            warn!(error = %e, "message handler panicked");
                        }
                    }

                    let messages = match self.transport.receive_messages().await {
                        Ok(messages) => messages,
                        Err(e) => {
                            warn!(error = %e, "receive failed, will retry");
                            continue;
                        }
                    };

                    for message in messages {
                        let bot = Arc::clone(&self);
                        in_flight.spawn(async move {
                            let sender = message.sender.clone();
                            // One bad message must not stop the bot
                            if let Err(e) = bot.handle_message(message).await {
                                warn!(sender = %sender, error = %e, "message handling failed");
                            }
                        });
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        if !in_flight.is_empty() {
            info!(handlers = in_flight.len(), "aborting in-flight message handlers");
        }
        in_flight.shutdown().await;
        info!("bot stopped");
        Ok(())
    }
}
