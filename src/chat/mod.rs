//! Chat transport seam.
//!
//! The platform gateway itself is out of scope; everything here talks to
//! it through `ChatTransport`.

pub mod bot;
pub mod commands;
pub mod group;
pub mod mock;
pub mod retry;
pub mod traits;

pub use bot::{format_reply, ComplianceBot};
pub use commands::{parse_command, Command, ParseError};
pub use group::GroupNotifier;
pub use mock::MockChatTransport;
pub use traits::{ChatError, ChatResult, ChatTransport, GroupId, Message, MessageSource, ServiceId};
