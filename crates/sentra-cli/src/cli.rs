// ── CLI definition ──

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sentra",
    about = "Sync engine for the Sentra home-security cloud",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Cloud account email
    #[arg(long, global = true, env = "SENTRA_EMAIL")]
    pub email: Option<String>,

    /// Cloud account password (prefer the env var or the config file)
    #[arg(long, global = true, env = "SENTRA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the cloud and keep syncing until interrupted
    Run,

    /// Diagnostic round-trip through the message handler
    Ping,

    /// Run a full synchronization over the canned test dataset and
    /// print the resulting state tree
    TestData,

    /// Debug queries against the live cloud
    #[command(subcommand)]
    Debug(DebugCommand),
}

#[derive(Debug, Subcommand)]
pub enum DebugCommand {
    /// Fetch raw base stations and elements
    LoadBasesElements,

    /// Fetch raw events in a time range
    LoadEvents(RangeArgs),

    /// Fetch an anonymized account snapshot for bug reports
    PrepareTestData(FromArgs),
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Start of the range, epoch milliseconds
    #[arg(long)]
    pub from: i64,

    /// End of the range, epoch milliseconds
    #[arg(long)]
    pub to: Option<i64>,
}

#[derive(Debug, Args)]
pub struct FromArgs {
    /// Start of the snapshot, epoch milliseconds
    #[arg(long)]
    pub from: i64,
}
