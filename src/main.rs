//! # trilho
//!
//! Position bridge binary: runs the UDP-to-WebSocket bridge, sends test
//! datagrams, or watches the bridge as a consumer would.

#![deny(unsafe_code)]

mod send;
mod serve;
mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use trilho_settings::TrilhoSettings;

/// Trilho position bridge.
#[derive(Parser, Debug)]
#[command(name = "trilho", version, about = "UDP-to-WebSocket position bridge")]
struct Cli {
    /// Settings file (defaults to `~/.trilho/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge.
    Serve(serve::ServeArgs),
    /// Send position datagrams to a running bridge.
    Send(send::SendArgs),
    /// Connect as a consumer and print each new position.
    Watch(watch::WatchArgs),
}

fn load(path: Option<&PathBuf>) -> Result<TrilhoSettings> {
    match path {
        Some(path) => trilho_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => trilho_settings::load_settings().context("failed to load settings"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.settings.as_ref())?;
    trilho_logging::init_logging(&settings.logging).context("failed to initialise logging")?;

    match cli.command {
        Command::Serve(args) => serve::run(settings, &args).await,
        Command::Send(args) => send::run(&settings, args).await,
        Command::Watch(args) => watch::run(&settings, &args).await,
    }
}
