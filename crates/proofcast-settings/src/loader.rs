//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ProofcastSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `PROOFCAST_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ProofcastSettings;

/// Default settings file, relative to the working directory.
pub fn settings_path() -> PathBuf {
    PathBuf::from("proofcast.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ProofcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ProofcastSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<ProofcastSettings> {
    let defaults = serde_json::to_value(ProofcastSettings::default())?;

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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ProofcastSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_overrides_with<F>(settings: &mut ProofcastSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PROOFCAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("PROOFCAST_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("PROOFCAST_PUBLIC_URL") {
        settings.server.public_url = v;
    }

    // ── Connection ──────────────────────────────────────────────────
    if let Some(v) = env.u64("PROOFCAST_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.connection.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64("PROOFCAST_READ_TIMEOUT_MS", 100, 3_600_000) {
        settings.connection.read_timeout_ms = v;
    }

    // ── Workflow ────────────────────────────────────────────────────
    if let Some(v) = env.bool("PROOFCAST_REQUIRE_LIVE_CONNECTION") {
        settings.workflow.require_live_connection = v;
    }
    if let Some(v) = env.u64("PROOFCAST_PENDING_TTL_MS", 1000, 86_400_000) {
        settings.workflow.pending_ttl_ms = v;
    }

    // ── Verifier ────────────────────────────────────────────────────
    if let Some(v) = env.string("PROOFCAST_VERIFIER_URL") {
        settings.verifier.url = v;
    }
    if let Some(v) = env.u64("PROOFCAST_VERIFIER_TIMEOUT_MS", 100, 600_000) {
        settings.verifier.timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PROOFCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PROOFCAST_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

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
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}
