mod cli;
mod config;
mod error;

use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use sentra_api::{ApiClient, testdata};
use sentra_core::{Engine, EngineConfig, InboundMessage, MemoryTree, handle_message};

use crate::cli::{Cli, Command, DebugCommand, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run => run_engine(&cli.global).await,
        Command::Ping => {
            let (engine, _tree) = offline_engine()?;
            let reply =
                handle_message(&engine, &InboundMessage::new("test", json!("ping"))).await;
            println!("{reply}");
            Ok(())
        }
        Command::TestData => {
            let (engine, tree) = offline_engine()?;
            let reply = handle_message(
                &engine,
                &InboundMessage::new("test", json!("process-test-data")),
            )
            .await;
            if let Some(error) = reply.get("error") {
                eprintln!("{error}");
                std::process::exit(error::exit_code::GENERAL);
            }
            for (id, value) in tree.dump_values() {
                println!("{id} = {value}");
            }
            Ok(())
        }
        Command::Debug(command) => run_debug(&cli.global, command).await,
    }
}

/// Connect to the cloud and sync until interrupted.
async fn run_engine(global: &GlobalOpts) -> Result<(), CliError> {
    let config = config::resolve(global)?;
    let api = ApiClient::new(config.api_config())?;
    let tree = Arc::new(MemoryTree::new());
    let engine = Engine::new(config, api, tree);

    tracing::info!("starting sync engine");
    tokio::select! {
        result = engine.run() => result.map_err(CliError::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            engine.shutdown().await;
            Ok(())
        }
    }
}

/// Debug queries print raw cloud payloads as pretty JSON.
async fn run_debug(global: &GlobalOpts, command: DebugCommand) -> Result<(), CliError> {
    let config = config::resolve(global)?;
    let api = ApiClient::new(config.api_config())?;
    api.authorize().await?;

    let payload = match command {
        DebugCommand::LoadBasesElements => {
            let bs = api.get_base_stations().await?;
            let elements = api.get_elements().await?;
            json!({ "bs": bs, "elements": elements })
        }
        DebugCommand::LoadEvents(range) => {
            let events = api.get_events_range(range.from, range.to).await?;
            json!({ "events": events })
        }
        DebugCommand::PrepareTestData(args) => {
            let (bs, elements, events) = testdata::retrieve_and_prepare(&api, args.from).await?;
            json!({ "bs": bs, "elements": elements, "events": events })
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&payload).expect("payload is serializable")
    );
    Ok(())
}

/// Engine over an in-memory tree with placeholder credentials; used by
/// diagnostic commands that never touch the network.
fn offline_engine() -> Result<(Engine<MemoryTree>, Arc<MemoryTree>), CliError> {
    let config = EngineConfig::new(
        "diagnostics@localhost",
        SecretString::from(String::new()),
    );
    let api = ApiClient::new(config.api_config())?;
    let tree = Arc::new(MemoryTree::new());
    Ok((Engine::new(config, api, Arc::clone(&tree)), tree))
}
