//! Consumer options.

use std::time::Duration;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use trilho_core::PositionScale;
use trilho_settings::ClientSettings;

use crate::errors::ConsumerError;

/// How a [`BridgeConsumer`](crate::BridgeConsumer) connects and reports.
#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    /// Bridge WebSocket URL.
    pub url: String,
    /// Wait between a dropped connection and the next attempt.
    pub reconnect_delay: Duration,
    /// Scale of the values handed to the callback.
    pub scale: PositionScale,
    /// Whether the consumer starts enabled.
    pub enabled: bool,
}

impl ConsumerOptions {
    /// Options for `url` with default delay and scale.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Check that the URL can be used for a WebSocket handshake.
    pub fn validate(&self) -> Result<(), ConsumerError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConsumerError::InvalidUrl(self.url.clone()));
        }
        let _ = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ConsumerError::InvalidUrl(format!("{}: {e}", self.url)))?;
        Ok(())
    }
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ConsumerOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            scale: settings.scale,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_client_settings() {
        let opts = ConsumerOptions::default();
        assert_eq!(opts.url, "ws://127.0.0.1:8081/");
        assert_eq!(opts.reconnect_delay, Duration::from_secs(3));
        assert_eq!(opts.scale, PositionScale::Percent);
        assert!(opts.enabled);
    }

    #[test]
    fn new_overrides_url_only() {
        let opts = ConsumerOptions::new("ws://bridge.local:9000/");
        assert_eq!(opts.url, "ws://bridge.local:9000/");
        assert_eq!(opts.reconnect_delay, Duration::from_secs(3));
    }

    #[test]
    fn validate_accepts_ws_and_wss() {
        assert!(ConsumerOptions::new("ws://127.0.0.1:8081/").validate().is_ok());
        assert!(ConsumerOptions::new("wss://bridge.example.com/").validate().is_ok());
    }

    #[test]
    fn validate_rejects_other_schemes() {
        for url in ["http://127.0.0.1:8081/", "127.0.0.1:8081", "", "ws://bad host/"] {
            let err = ConsumerOptions::new(url).validate().unwrap_err();
            assert!(matches!(err, ConsumerError::InvalidUrl(_)), "{url}");
        }
    }
}
