//! # trilho-settings
//!
//! Configuration for the position bridge and its consumers.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TrilhoSettings::default()`]
//! 2. **User file**: `~/.trilho/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TRILHO_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_installation_ports() {
        let settings = TrilhoSettings::default();
        assert_eq!(settings.udp.port, 8888);
        assert_eq!(settings.websocket.port, 8081);
        assert_eq!(settings.client.url, "ws://127.0.0.1:8081/");
        assert_eq!(settings.client.reconnect_delay_ms, 3000);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }

    #[test]
    fn re_exports_work() {
        let _settings = TrilhoSettings::default();
        let _path = settings_path();
        let merged = deep_merge(serde_json::json!({"x": 1}), serde_json::json!({"y": 2}));
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
