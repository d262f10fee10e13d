//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TrilhoSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `TRILHO_*` environment variable overrides
//! 4. Validate

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::TrilhoSettings;

/// Resolve the path to the settings file (`~/.trilho/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".trilho").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TrilhoSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<TrilhoSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<TrilhoSettings> {
    let defaults = serde_json::to_value(TrilhoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TRILHO_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut TrilhoSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Empty values are treated as unset. Unparseable or out-of-range values are
/// ignored with a warning and the file/default value is kept.
pub fn apply_overrides_from<F>(settings: &mut TrilhoSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("TRILHO_HOST") {
        settings.udp.host.clone_from(&v);
        settings.websocket.host = v;
    }
    if let Some(v) = env.u16("TRILHO_UDP_PORT") {
        settings.udp.port = v;
    }
    if let Some(v) = env.u16("TRILHO_WS_PORT") {
        settings.websocket.port = v;
    }
    if let Some(v) = env.u64("TRILHO_MAX_CONNECTIONS", 1, 100_000) {
        settings.websocket.max_connections = usize::try_from(v).unwrap_or(usize::MAX);
    }
    if let Some(v) = env.u64("TRILHO_HEARTBEAT_INTERVAL_SECS", 1, 3600) {
        settings.websocket.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.u64("TRILHO_HEARTBEAT_TIMEOUT_SECS", 1, 86_400) {
        settings.websocket.heartbeat_timeout_secs = v;
    }
    if let Some(v) = env.string("TRILHO_BRIDGE_URL") {
        settings.client.url = v;
    }
    if let Some(v) = env.u64("TRILHO_RECONNECT_DELAY_MS", 10, 600_000) {
        settings.client.reconnect_delay_ms = v;
    }
    if let Some(v) = env.string("TRILHO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("TRILHO_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str) -> Option<u16> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, 0, u64::from(u16::MAX))
            .and_then(|n| u16::try_from(n).ok());
        if result.is_none() {
            warn!(key = name, value = %val, "invalid port env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::errors::SettingsError;
    use trilho_core::PositionScale;

    fn overrides(pairs: &[(&str, &str)]) -> TrilhoSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = TrilhoSettings::default();
        apply_overrides_from(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"udp": {"port": 8888, "host": "0.0.0.0"}});
        let source = serde_json::json!({"udp": {"port": 9999}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["udp"]["port"], 9999);
        assert_eq!(merged["udp"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_settings_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.udp.port, 8888);
        assert_eq!(settings.websocket.port, 8081);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"udp": {"port": 9999}, "client": {"scale": "unit", "reconnectDelayMs": 500}}"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.udp.port, 9999);
        assert_eq!(settings.udp.max_datagram_bytes, 1024);
        assert_eq!(settings.client.scale, PositionScale::Unit);
        assert_eq!(settings.client.reconnect_delay_ms, 500);
        assert_eq!(settings.websocket.port, 8081);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_invalid_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"websocket": {"sendQueue": 0}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_ports_override() {
        let settings = overrides(&[("TRILHO_UDP_PORT", "9000"), ("TRILHO_WS_PORT", "9001")]);
        assert_eq!(settings.udp.port, 9000);
        assert_eq!(settings.websocket.port, 9001);
    }

    #[test]
    fn env_host_applies_to_both_listeners() {
        let settings = overrides(&[("TRILHO_HOST", "127.0.0.1")]);
        assert_eq!(settings.udp.host, "127.0.0.1");
        assert_eq!(settings.websocket.host, "127.0.0.1");
    }

    #[test]
    fn env_invalid_port_ignored() {
        let settings = overrides(&[("TRILHO_UDP_PORT", "70000"), ("TRILHO_WS_PORT", "abc")]);
        assert_eq!(settings.udp.port, 8888);
        assert_eq!(settings.websocket.port, 8081);
    }

    #[test]
    fn env_empty_value_ignored() {
        let settings = overrides(&[("TRILHO_BRIDGE_URL", "")]);
        assert_eq!(settings.client.url, "ws://127.0.0.1:8081/");
    }

    #[test]
    fn env_client_and_logging() {
        let settings = overrides(&[
            ("TRILHO_BRIDGE_URL", "ws://bridge.local:8081/"),
            ("TRILHO_RECONNECT_DELAY_MS", "1500"),
            ("TRILHO_LOG_LEVEL", "debug"),
            ("TRILHO_LOG_JSON", "yes"),
        ]);
        assert_eq!(settings.client.url, "ws://bridge.local:8081/");
        assert_eq!(settings.client.reconnect_delay_ms, 1500);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn env_reconnect_delay_out_of_range_ignored() {
        let settings = overrides(&[("TRILHO_RECONNECT_DELAY_MS", "1")]);
        assert_eq!(settings.client.reconnect_delay_ms, 3000);
    }

    #[test]
    fn env_heartbeat_interval_and_timeout_together() {
        let settings = overrides(&[
            ("TRILHO_HEARTBEAT_INTERVAL_SECS", "300"),
            ("TRILHO_HEARTBEAT_TIMEOUT_SECS", "900"),
        ]);
        assert_eq!(settings.websocket.heartbeat_interval_secs, 300);
        assert_eq!(settings.websocket.heartbeat_timeout_secs, 900);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn env_heartbeat_timeout_out_of_range_ignored() {
        let settings = overrides(&[("TRILHO_HEARTBEAT_TIMEOUT_SECS", "0")]);
        assert_eq!(settings.websocket.heartbeat_timeout_secs, 90);
    }

    // ── parsing helpers ─────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("10", 10, 20), Some(10));
        assert_eq!(parse_u64_range("20", 10, 20), Some(20));
        assert_eq!(parse_u64_range("21", 10, 20), None);
        assert_eq!(parse_u64_range("-1", 0, 20), None);
    }
}
