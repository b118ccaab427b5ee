//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HuddleSettings::default()`]
//! 2. If `~/.huddle/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `HUDDLE_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use huddle_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::HuddleSettings;

/// Resolve the huddle home directory (`~/.huddle`).
pub fn huddle_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle")
}

/// Resolve the path to the settings file (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    huddle_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
fn read_layered(path: &Path) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())?;

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

/// Apply `HUDDLE_*` process environment overrides.
pub fn apply_env_overrides(settings: &mut HuddleSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values are strictly parsed; anything invalid or out of range is ignored
/// with a warning and the file/default value is kept.
pub fn apply_overrides(settings: &mut HuddleSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("HUDDLE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("HUDDLE_OUTBOUND_QUEUE", 1, 1_048_576) {
        settings.server.outbound_queue_capacity = v;
    }
    if let Some(v) = env.u64("HUDDLE_MAX_DROPS", 1, 1_000_000) {
        settings.server.max_total_drops = v;
    }
    if let Some(v) = env.usize("HUDDLE_MAX_MESSAGE_SIZE", 1024, 1_073_741_824) {
        settings.server.max_message_size = v;
    }

    // ── History ─────────────────────────────────────────────────────
    if let Some(v) = env.usize("HUDDLE_HISTORY_LIMIT", 0, 100_000) {
        settings.history.default_limit = v;
    }
    if let Some(v) = env.usize("HUDDLE_HISTORY_MAX_LIMIT", 1, 100_000) {
        settings.history.max_limit = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_DB_PATH") {
        settings.storage.db_path = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("HUDDLE_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "HUDDLE_LOG_FORMAT", value = %v, error = %e, "ignoring env var"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8000, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
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

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_layered(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9001}, "history": {"defaultLimit": 20}}"#,
        )
        .unwrap();

        let settings = read_layered(&path).unwrap();
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.history.default_limit, 20);
        assert_eq!(settings.history.max_limit, 500);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert_matches!(read_layered(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn inconsistent_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"history": {"defaultLimit": 10, "maxLimit": 5}}"#).unwrap();
        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            env(&[
                ("HUDDLE_HOST", "0.0.0.0"),
                ("HUDDLE_PORT", "9100"),
                ("HUDDLE_OUTBOUND_QUEUE", "32"),
                ("HUDDLE_MAX_DROPS", "5"),
                ("HUDDLE_HISTORY_LIMIT", "10"),
                ("HUDDLE_DB_PATH", ":memory:"),
                ("HUDDLE_LOG_LEVEL", "debug"),
                ("HUDDLE_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 9100);
        assert_eq!(s.server.outbound_queue_capacity, 32);
        assert_eq!(s.server.max_total_drops, 5);
        assert_eq!(s.history.default_limit, 10);
        assert!(s.storage.is_in_memory());
        assert_eq!(s.logging.level, "debug");
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            env(&[
                ("HUDDLE_PORT", "0"),
                ("HUDDLE_OUTBOUND_QUEUE", "lots"),
                ("HUDDLE_LOG_FORMAT", "pretty"),
                ("HUDDLE_HOST", ""),
            ]),
        );
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.server.outbound_queue_capacity, 256);
        assert_eq!(s.logging.format, LogFormat::Compact);
        assert_eq!(s.server.host, "127.0.0.1");
    }

    #[test]
    fn no_overrides_keeps_values() {
        let mut s = HuddleSettings::default();
        apply_overrides(&mut s, |_| None);
        assert_eq!(s.server.port, 8000);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8000", 1, 65535), Some(8000));
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range("0", 1, 10), None);
        assert_eq!(parse_usize_range("10", 0, 10), Some(10));
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }

    #[test]
    fn home_paths() {
        assert!(settings_path().ends_with(".huddle/settings.json"));
        assert!(huddle_home().ends_with(".huddle"));
    }
}
