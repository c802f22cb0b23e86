use clap::{Parser, Subcommand};
use snov::gatekeeper::ResponseStatus;
use std::process::ExitCode;

pub mod challenge;
pub mod config;
pub mod revoke;
pub mod run;
pub mod service;
pub mod status;
pub mod sweep;
pub mod verify;
pub mod version;

#[derive(Parser)]
#[command(name = "snov")]
#[command(author = "SNOV Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the sentry node owner verification daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon (periodic re-validation sweep)
    Run {
        /// Path to config file (default: ~/.local/share/snov/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Print the message a requester must sign
    Challenge {
        /// Collateral transaction id (64 hex characters)
        #[arg(long)]
        txid: String,

        /// Requester account id
        #[arg(long)]
        requester: String,
    },

    /// Verify a signed challenge and record the result
    /// (exit code 0 SUCCESS, 1 FAIL, 2 ERROR)
    Verify {
        /// Collateral transaction id (64 hex characters)
        #[arg(long)]
        txid: String,

        /// Requester account id
        #[arg(long)]
        requester: String,

        /// Base64 output of the wallet's signmessage
        #[arg(long)]
        signature: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// Run one re-validation sweep now
    Sweep {
        #[arg(long)]
        config: Option<String>,
    },

    /// List verification records
    Status {
        #[arg(long)]
        config: Option<String>,
    },

    /// Revoke a requester's verification
    Revoke {
        /// Requester account id
        #[arg(long)]
        requester: String,

        #[arg(long)]
        config: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config } => run::execute(config).await?,
        Commands::Challenge { txid, requester } => challenge::execute(&txid, &requester)?,
        Commands::Verify {
            txid,
            requester,
            signature,
            config,
        } => {
            // Setup failures are an ERROR outcome too, never a FAIL
            let status = match verify::execute(txid, requester, signature, config).await {
                Ok(status) => status,
                Err(e) => {
                    println!("{}: {}", ResponseStatus::Error, e);
                    ResponseStatus::Error
                }
            };
            return Ok(ExitCode::from(verify::exit_status(status)));
        }
        Commands::Sweep { config } => sweep::execute(config).await?,
        Commands::Status { config } => status::execute(config).await?,
        Commands::Revoke { requester, config } => revoke::execute(requester, config).await?,
        Commands::Version => version::execute(),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "a3f1c2d4e5b6a7980112233445566778899aabbccddeeff00112233445566778";

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["snov", "run", "--config", "/etc/snov.toml"]);
        match cli.command {
            Commands::Run { config } => assert_eq!(config.as_deref(), Some("/etc/snov.toml")),
            _ => panic!("Expected Run command"),
        }

        let cli = Cli::parse_from(["snov", "run"]);
        assert!(matches!(cli.command, Commands::Run { config: None }));
    }

    #[test]
    fn test_cli_parse_challenge() {
        let cli = Cli::parse_from(["snov", "challenge", "--txid", TXID, "--requester", "alice"]);
        match cli.command {
            Commands::Challenge { txid, requester } => {
                assert_eq!(txid, TXID);
                assert_eq!(requester, "alice");
            }
            _ => panic!("Expected Challenge command"),
        }
    }

    #[test]
    fn test_cli_parse_verify() {
        let cli = Cli::parse_from([
            "snov",
            "verify",
            "--txid",
            TXID,
            "--requester",
            "alice",
            "--signature",
            "H+sig/base64=",
        ]);
        match cli.command {
            Commands::Verify {
                txid,
                requester,
                signature,
                config,
            } => {
                assert_eq!(txid, TXID);
                assert_eq!(requester, "alice");
                assert_eq!(signature, "H+sig/base64=");
                assert!(config.is_none());
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_cli_parse_verify_requires_signature() {
        let result = Cli::try_parse_from(["snov", "verify", "--txid", TXID, "--requester", "alice"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_sweep_status_revoke_version() {
        assert!(matches!(
            Cli::parse_from(["snov", "sweep"]).command,
            Commands::Sweep { config: None }
        ));
        assert!(matches!(
            Cli::parse_from(["snov", "status"]).command,
            Commands::Status { config: None }
        ));
        match Cli::parse_from(["snov", "revoke", "--requester", "bob"]).command {
            Commands::Revoke { requester, .. } => assert_eq!(requester, "bob"),
            _ => panic!("Expected Revoke command"),
        }
        assert!(matches!(
            Cli::parse_from(["snov", "version"]).command,
            Commands::Version
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["snov", "register"]).is_err());
    }
}
