//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StatustagSettings::default()`]
//! 2. If `~/.statustag/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STATUSTAG_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use statustag_core::AnimatedStrategy;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LogFormat, StatustagSettings};

/// `~/.statustag`, falling back to `/tmp/.statustag` without `HOME`.
pub fn statustag_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".statustag")
}

/// Resolve the path to the settings file (`~/.statustag/settings.json`).
pub fn settings_path() -> PathBuf {
    statustag_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StatustagSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the result fails validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<StatustagSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file(path: &Path) -> Result<StatustagSettings> {
    let defaults = serde_json::to_value(StatustagSettings::default())?;

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

/// Apply `STATUSTAG_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut StatustagSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from any key lookup. Invalid values are ignored with a warning.
pub fn apply_overrides(settings: &mut StatustagSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("STATUSTAG_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed(&read, "STATUSTAG_PORT", |v| parse_u16_range(v, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read_parsed(&read, "STATUSTAG_POLL_INTERVAL_MS", |v| {
        parse_u64_range(v, 10, 3_600_000)
    }) {
        settings.server.poll_interval_ms = v;
    }
    if let Some(v) = read_parsed(&read, "STATUSTAG_HEARTBEAT_INTERVAL_MS", |v| {
        parse_u64_range(v, 10, 3_600_000)
    }) {
        settings.server.heartbeat_interval_ms = v;
    }

    // ── Streaming ───────────────────────────────────────────────────
    if let Some(v) = read_parsed(&read, "STATUSTAG_ANIMATED_STRATEGY", AnimatedStrategy::parse) {
        settings.streaming.animated_strategy = v;
    }
    if let Some(v) = read_parsed(&read, "STATUSTAG_ENCODE_WORKERS", |v| parse_usize_range(v, 1, 256)) {
        settings.streaming.encode_workers = v;
    }

    // ── Store / logging ─────────────────────────────────────────────
    if let Some(v) = read("STATUSTAG_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read("STATUSTAG_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_parsed(&read, "STATUSTAG_LOG_FORMAT", parse_log_format) {
        settings.logging.format = v;
    }
}

fn read_parsed<T>(
    read: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = read(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse `text` or `json` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_ascii_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

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
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, StatustagSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"pollIntervalMs": 250}, "streaming": {"animatedStrategy": "passthrough"}}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.server.poll_interval_ms, 250);
        assert_eq!(settings.server.heartbeat_interval_ms, 10_000);
        assert_eq!(settings.streaming.animated_strategy, AnimatedStrategy::Passthrough);
        assert_eq!(settings.streaming.encode_workers, 4);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(load_file(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"pollIntervalMs": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut s = StatustagSettings::default();
        apply_overrides(
            &mut s,
            env(&[
                ("STATUSTAG_HOST", "127.0.0.1"),
                ("STATUSTAG_PORT", "9000"),
                ("STATUSTAG_POLL_INTERVAL_MS", "1000"),
                ("STATUSTAG_HEARTBEAT_INTERVAL_MS", "2000"),
                ("STATUSTAG_ANIMATED_STRATEGY", "passthrough"),
                ("STATUSTAG_ENCODE_WORKERS", "2"),
                ("STATUSTAG_DB_PATH", "/var/lib/statustag.db"),
                ("STATUSTAG_LOG_LEVEL", "debug"),
                ("STATUSTAG_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.poll_interval_ms, 1000);
        assert_eq!(s.server.heartbeat_interval_ms, 2000);
        assert_eq!(s.streaming.animated_strategy, AnimatedStrategy::Passthrough);
        assert_eq!(s.streaming.encode_workers, 2);
        assert_eq!(s.store.db_path, "/var/lib/statustag.db");
        assert_eq!(s.logging.level, "debug");
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut s = StatustagSettings::default();
        apply_overrides(
            &mut s,
            env(&[
                ("STATUSTAG_PORT", "0"),
                ("STATUSTAG_POLL_INTERVAL_MS", "soon"),
                ("STATUSTAG_ANIMATED_STRATEGY", "mp4"),
                ("STATUSTAG_ENCODE_WORKERS", "0"),
                ("STATUSTAG_LOG_FORMAT", "xml"),
                ("STATUSTAG_HOST", ""),
            ]),
        );
        assert_eq!(s, StatustagSettings::default());
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("65535", 1, 65535), Some(65535));
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_usize_range("50", 1, 256), Some(50));
        assert_eq!(parse_log_format("JSON"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("yaml"), None);
    }
}
