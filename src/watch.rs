//! `trilho watch`: print positions as a browser consumer would see them.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use trilho_client::{BridgeConsumer, ConsumerOptions};
use trilho_core::PositionScale;
use trilho_settings::TrilhoSettings;

/// Flags for `trilho watch`.
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Bridge WebSocket URL (defaults to `client.url`).
    #[arg(long)]
    pub url: Option<String>,

    /// Print 0-1 values instead of percent.
    #[arg(long)]
    pub unit: bool,
}

fn consumer_options(settings: &TrilhoSettings, args: &WatchArgs) -> ConsumerOptions {
    let mut options = ConsumerOptions::from(&settings.client);
    if let Some(url) = &args.url {
        options.url.clone_from(url);
    }
    if args.unit {
        options.scale = PositionScale::Unit;
    }
    options
}

pub async fn run(settings: &TrilhoSettings, args: &WatchArgs) -> Result<()> {
    let options = consumer_options(settings, args);
    let url = options.url.clone();
    let unit = options.scale == PositionScale::Unit;

    let consumer = BridgeConsumer::spawn(options, move |value| {
        if unit {
            println!("{value:.3}");
        } else {
            println!("{value:.1}%");
        }
    })
    .context("failed to start consumer")?;

    let mut states = consumer.subscribe_state();
    info!(%url, "watching bridge, press Ctrl-C to stop");
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!(?state, "consumer state");
            }
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }
    consumer.shutdown().await;
    Ok(())
}
