//! Direct-message command parsing.
//!
//! Commands are parsed once at the boundary into a closed enum; nothing
//! past this module looks at raw message text.
//!
//! ```text
//! !help
//! !getmessage <txid>
//! !verify <txid> <signature>
//! ```

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    GetChallenge { transaction_id: String },
    Verify {
        transaction_id: String,
        signature: String,
    },
    Unknown(String),
}

/// A recognised command word with missing arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing a collateral transaction id. Usage: {0}")]
    MissingTransactionId(&'static str),

    #[error("Missing a collateral transaction id or signed message. Usage: {0}")]
    MissingSignature(&'static str),
}

pub const GET_CHALLENGE_USAGE: &str = "!getmessage <collateral txid>";
pub const VERIFY_USAGE: &str = "!verify <collateral txid> <signed message>";

/// Parse DM text. The command word is case-insensitive; extra trailing
/// arguments are ignored.
pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let Some(word) = parts.first() else {
        return Ok(Command::Unknown(String::new()));
    };

    match word.to_lowercase().as_str() {
        "!help" => Ok(Command::Help),
        "!getmessage" => match parts.get(1) {
            Some(txid) => Ok(Command::GetChallenge {
                transaction_id: txid.to_string(),
            }),
            None => Err(ParseError::MissingTransactionId(GET_CHALLENGE_USAGE)),
        },
        "!verify" => match (parts.get(1), parts.get(2)) {
            (Some(txid), Some(signature)) => Ok(Command::Verify {
                transaction_id: txid.to_string(),
                signature: signature.to_string(),
            }),
            _ => Err(ParseError::MissingSignature(VERIFY_USAGE)),
        },
        _ => Ok(Command::Unknown(word.to_string())),
    }
}

/// Reply to `!help`.
pub fn help_text() -> String {
    format!(
        "This bot verifies that you own a sentry node collateral and then \
         gives you access to the sentry node owners channel.\n\
         \n\
         1. Get the message to sign:\n\
         > {GET_CHALLENGE_USAGE}\n\
         The collateral txid is the id of the transaction that funded your node.\n\
         \n\
         2. Sign that message with the wallet holding the collateral address \
         (signmessage), then send the result:\n\
         > {VERIFY_USAGE}\n\
         \n\
         Access is re-checked daily and removed if the collateral is spent \
         or the node is no longer enabled."
    )
}
