//! # veilcli — wallet tool for the VEIL confidential-value layer
//!
//! Owns the wallet-side serial-number sidecar (see [`store::SerialStore`])
//! and exposes the handful of operations a wallet operator needs between
//! broadcasts: inspect the flow state, record a broadcast, settle a
//! confirmed transaction, and reset a wallet.
//!
//! The store is opened once here and passed by reference into each
//! command; it closes when the process exits.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use veil_protocol::crypto::hash::Hash;

use crate::store::{SerialStore, Stage};

mod store;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Wallet command-line tool for the VEIL confidential-value layer.
#[derive(Parser, Debug)]
#[command(name = "veilcli", about = "VEIL wallet tool", version)]
struct Cli {
    /// Wallet home directory holding the serial sidecar.
    ///
    /// Defaults to `$HOME/.veilcli`.
    #[arg(long, env = "VEIL_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the wallet's confidential flow state.
    Status {
        /// Emit machine-readable JSON instead of the table.
        #[arg(long)]
        json: bool,
    },
    /// Print the sidecar file path.
    Path,
    /// Record a broadcast confidential transaction.
    Record {
        /// The consumed serial, hex-encoded (with or without 0x).
        #[arg(long)]
        serial: String,
        /// The successor serial, hex-encoded.
        #[arg(long)]
        next: String,
        /// The flow stage entered by the broadcast.
        #[arg(long, value_parser = parse_stage)]
        stage: Stage,
    },
    /// Mark the in-flight transaction as confirmed and return to idle.
    Settle,
    /// Wipe the sidecar back to a fresh wallet.
    Reset {
        /// Required; a reset discards the wallet's spend history.
        #[arg(long)]
        yes: bool,
    },
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    match s {
        "mint" => Ok(Stage::MintSubmitted),
        "send" => Ok(Stage::SendSubmitted),
        "deposit" => Ok(Stage::DepositSubmitted),
        "redeem" => Ok(Stage::RedeemSubmitted),
        "update" => Ok(Stage::UpdateSubmitted),
        other => Err(format!(
            "unknown stage {other:?} (expected mint|send|deposit|redeem|update)"
        )),
    }
}

fn parse_hash(s: &str) -> Result<Hash> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).context("serial is not valid hex")?;
    Hash::from_slice(&bytes).context("serial must be exactly 32 bytes")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut store = match &cli.home {
        Some(home) => SerialStore::open(home)?,
        None => SerialStore::open_default()?,
    };

    match cli.command {
        Commands::Status { json } => {
            let state = store.state();
            if json {
                println!("{}", serde_json::to_string_pretty(state)?);
            } else {
                println!("stage:          {}", state.stage);
                println!("sequence:       {}", state.sequence);
                println!("sequence after: {}", state.sequence_after);
                println!("spent serials:  {}", state.spent.len());
                match &state.one_time_key {
                    Some(key) => println!("one-time key:   {}", key.address()),
                    None => println!("one-time key:   none"),
                }
            }
        }
        Commands::Path => {
            println!("{}", store.path().display());
        }
        Commands::Record {
            serial,
            next,
            stage,
        } => {
            let consumed = parse_hash(&serial)?;
            let successor = parse_hash(&next)?;
            store.record_broadcast(consumed, successor, stage)?;
            println!("recorded {stage} with serial {consumed}");
        }
        Commands::Settle => {
            store.settle()?;
            println!("settled; wallet is idle");
        }
        Commands::Reset { yes } => {
            anyhow::ensure!(yes, "refusing to reset without --yes");
            store.reset()?;
            println!("sidecar reset");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parser_accepts_known_stages() {
        assert_eq!(parse_stage("mint").unwrap(), Stage::MintSubmitted);
        assert_eq!(parse_stage("deposit").unwrap(), Stage::DepositSubmitted);
        assert!(parse_stage("sideways").is_err());
    }

    #[test]
    fn hash_parser_accepts_prefixed_and_bare_hex() {
        let hex64 = "11".repeat(32);
        assert!(parse_hash(&hex64).is_ok());
        assert!(parse_hash(&format!("0x{hex64}")).is_ok());
        assert!(parse_hash("0xdead").is_err());
        assert!(parse_hash("not hex").is_err());
    }

    #[test]
    fn cli_parses_record_command() {
        let hex64 = "22".repeat(32);
        let cli = Cli::try_parse_from([
            "veilcli",
            "record",
            "--serial",
            &hex64,
            "--next",
            &hex64,
            "--stage",
            "send",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { stage, .. } => assert_eq!(stage, Stage::SendSubmitted),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
