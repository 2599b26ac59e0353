//! Checks run on the merged configuration before the server starts.

use super::AppConfig;
use crate::utils::validate_endpoint_url;

pub(crate) fn validate(config: &AppConfig) -> Result<(), String> {
    validate_url("openai_api_base", &config.openai_api_base)?;
    validate_url("realtime_url", &config.realtime_url)?;
    if let Some(token_url) = &config.token_url {
        validate_url("token_url", token_url)?;
    }

    if config.data_channel_label.trim().is_empty() {
        return Err("data_channel_label must not be empty".to_string());
    }
    if config.event_log_capacity == 0 {
        return Err("event_log_capacity must be greater than zero".to_string());
    }
    if config.camera_max_dimension == 0 {
        return Err("camera_max_dimension must be greater than zero".to_string());
    }
    if config.realtime_model.trim().is_empty() {
        return Err("realtime_model must not be empty".to_string());
    }
    for server in &config.ice_servers {
        if !(server.starts_with("stun:") || server.starts_with("turn:") || server.starts_with("turns:")) {
            return Err(format!(
                "ice_servers entry '{server}' must use the stun:, turn: or turns: scheme"
            ));
        }
    }
    Ok(())
}

fn validate_url(field: &str, raw: &str) -> Result<(), String> {
    validate_endpoint_url(raw)
        .map(|_| ())
        .map_err(|e| format!("Invalid {field} '{raw}': {e}"))
}
