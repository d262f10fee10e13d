//! `trilho serve`: run the bridge until Ctrl-C.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use trilho_bridge::{BridgeConfig, BridgeServer};
use trilho_settings::TrilhoSettings;

/// Flags for `trilho serve`. Each one overrides the settings file and env.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// UDP port for position datagrams.
    #[arg(long)]
    pub udp_port: Option<u16>,

    /// WebSocket/HTTP port.
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Bind host for both listeners.
    #[arg(long)]
    pub host: Option<String>,
}

fn apply_overrides(settings: &mut TrilhoSettings, args: &ServeArgs) {
    if let Some(port) = args.udp_port {
        settings.udp.port = port;
    }
    if let Some(port) = args.ws_port {
        settings.websocket.port = port;
    }
    if let Some(host) = &args.host {
        settings.udp.host.clone_from(host);
        settings.websocket.host.clone_from(host);
    }
}

pub async fn run(mut settings: TrilhoSettings, args: &ServeArgs) -> Result<()> {
    apply_overrides(&mut settings, args);
    let server = BridgeServer::new(BridgeConfig::from(&settings));
    let handle = server.listen().await.context("failed to start bridge")?;

    info!(
        udp = %handle.udp_addr,
        ws = %handle.ws_url(),
        "bridge ready, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");
    handle.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_settings() {
        let mut settings = TrilhoSettings::default();
        apply_overrides(&mut settings, &ServeArgs::default());
        assert_eq!(settings.udp.port, 8888);
        assert_eq!(settings.websocket.port, 8081);
        assert_eq!(settings.udp.host, "0.0.0.0");
    }

    #[test]
    fn flags_override_ports_and_host() {
        let mut settings = TrilhoSettings::default();
        let args = ServeArgs {
            udp_port: Some(9000),
            ws_port: Some(9001),
            host: Some("127.0.0.1".into()),
        };
        apply_overrides(&mut settings, &args);
        let config = BridgeConfig::from(&settings);
        assert_eq!(config.udp_addr(), "127.0.0.1:9000");
        assert_eq!(config.ws_addr(), "127.0.0.1:9001");
    }
}
