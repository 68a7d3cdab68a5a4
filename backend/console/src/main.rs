//! CrowdTank operator console: entry point.
//!
//! Deploys the campaign ledger, runs its entry points on behalf of a caller
//! and keeps the ledger's event journal in SQLite. Every invocation rebuilds
//! the ledger by replaying the journal, runs one command, and appends the
//! events it produced.

mod cli;
mod commands;
mod config;
mod db;
mod errors;
mod journal;

use clap::Parser;
use crowd_tank::{Clock, Identity, SystemClock};
use tracing_subscriber::EnvFilter;

use cli::CrowdTankCli;
use commands::Context;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = CrowdTankCli::parse();
    let config = Config::from_env()?;

    let database_url = cli.database_url.unwrap_or(config.database_url);
    let ctx = Context {
        caller: cli.caller.or(config.caller).map(Identity::from),
        now: config::fixed_now(cli.at)?.unwrap_or_else(|| SystemClock.now()),
    };
    if cli.command.needs_caller() && ctx.caller.is_none() {
        anyhow::bail!("this command needs --caller or CROWDTANK_CALLER");
    }

    let pool = db::init_pool(&database_url).await?;
    let output = commands::run(pool, cli.command, &ctx).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.value)?);
    } else if !output.text.is_empty() {
        println!("{}", output.text);
    }
    Ok(())
}
