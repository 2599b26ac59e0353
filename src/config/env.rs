//! Environment variable access for configuration loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Every variable the server reads.
pub(crate) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "OPENAI_API_KEY",
    "OPENAI_API_BASE",
    "REALTIME_MODEL",
    "REALTIME_VOICE",
    "REALTIME_URL",
    "TOKEN_URL",
    "DATA_CHANNEL_LABEL",
    "ICE_SERVERS",
    "ICE_GATHERING_TIMEOUT_MS",
    "EVENT_LOG_CAPACITY",
    "INSTRUCTIONS_PATH",
    "CAMERA_SNAPSHOT_PATH",
    "CAMERA_MAX_DIMENSION",
    "CAPTURE_OUTPUT_DIR",
    "VISION_MODEL",
    "PREDICTION_MODEL",
    "IMAGE_MODEL",
    "CORS_ALLOWED_ORIGINS",
];

/// Non-empty, trimmed value of `key`.
pub(crate) fn string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn path(key: &str) -> Option<PathBuf> {
    string(key).map(PathBuf::from)
}

/// Parse `key` when set. An unparsable value is an error, not a default.
pub(crate) fn parse<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}")),
    }
}

/// Comma-separated list; empty items are skipped.
pub(crate) fn list(key: &str) -> Option<Vec<String>> {
    string(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}
