//! Layering of defaults, environment variables and YAML overrides.

use std::path::PathBuf;

use super::AppConfig;
use super::env;
use super::yaml::YamlConfig;
use crate::core::realtime::OpenAIRealtimeVoice;
use crate::core::realtime::openai::{
    DATA_CHANNEL_LABEL, DEFAULT_REALTIME_MODEL, DEFAULT_STUN_SERVER, OPENAI_API_BASE,
    OPENAI_REALTIME_URL,
};
use crate::core::realtime::DEFAULT_LOG_CAPACITY;
use crate::core::tools::camera::DEFAULT_MAX_DIMENSION;
use crate::core::tools::vision::{
    DEFAULT_IMAGE_MODEL, DEFAULT_PREDICTION_MODEL, DEFAULT_VISION_MODEL,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_ICE_GATHERING_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CAPTURE_DIR: &str = "captures";
const DEFAULT_SNAPSHOT_FILE: &str = "latest.jpg";

/// Configuration with every value at its default.
pub(crate) fn defaults() -> AppConfig {
    AppConfig {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
        openai_api_key: None,
        openai_api_base: OPENAI_API_BASE.to_string(),
        realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
        realtime_voice: None,
        realtime_url: OPENAI_REALTIME_URL.to_string(),
        token_url: None,
        data_channel_label: DATA_CHANNEL_LABEL.to_string(),
        ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        ice_gathering_timeout_ms: DEFAULT_ICE_GATHERING_TIMEOUT_MS,
        event_log_capacity: DEFAULT_LOG_CAPACITY,
        instructions_path: None,
        camera_snapshot_path: PathBuf::from(DEFAULT_CAPTURE_DIR).join(DEFAULT_SNAPSHOT_FILE),
        camera_max_dimension: DEFAULT_MAX_DIMENSION,
        capture_output_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
        vision_model: DEFAULT_VISION_MODEL.to_string(),
        prediction_model: DEFAULT_PREDICTION_MODEL.to_string(),
        image_model: DEFAULT_IMAGE_MODEL.to_string(),
        cors_allowed_origins: None,
    }
}

fn parse_voice(raw: &str) -> Result<OpenAIRealtimeVoice, String> {
    OpenAIRealtimeVoice::parse(raw).ok_or_else(|| {
        let known: Vec<_> = OpenAIRealtimeVoice::all()
            .iter()
            .map(|v| v.as_str())
            .collect();
        format!("Unknown voice '{raw}'. Expected one of: {}", known.join(", "))
    })
}

/// Apply environment variables on top of the defaults.
fn apply_env(config: &mut AppConfig) -> Result<(), String> {
    if let Some(v) = env::string("HOST") {
        config.host = v;
    }
    if let Some(v) = env::parse("PORT")? {
        config.port = v;
    }
    if let Some(v) = env::string("OPENAI_API_KEY") {
        config.openai_api_key = Some(v);
    }
    if let Some(v) = env::string("OPENAI_API_BASE") {
        config.openai_api_base = v;
    }
    if let Some(v) = env::string("REALTIME_MODEL") {
        config.realtime_model = v;
    }
    if let Some(v) = env::string("REALTIME_VOICE") {
        config.realtime_voice = Some(parse_voice(&v)?);
    }
    if let Some(v) = env::string("REALTIME_URL") {
        config.realtime_url = v;
    }
    if let Some(v) = env::string("TOKEN_URL") {
        config.token_url = Some(v);
    }
    if let Some(v) = env::string("DATA_CHANNEL_LABEL") {
        config.data_channel_label = v;
    }
    if let Some(v) = env::list("ICE_SERVERS") {
        config.ice_servers = v;
    }
    if let Some(v) = env::parse("ICE_GATHERING_TIMEOUT_MS")? {
        config.ice_gathering_timeout_ms = v;
    }
    if let Some(v) = env::parse("EVENT_LOG_CAPACITY")? {
        config.event_log_capacity = v;
    }
    if let Some(v) = env::path("INSTRUCTIONS_PATH") {
        config.instructions_path = Some(v);
    }
    if let Some(v) = env::path("CAMERA_SNAPSHOT_PATH") {
        config.camera_snapshot_path = v;
    }
    if let Some(v) = env::parse("CAMERA_MAX_DIMENSION")? {
        config.camera_max_dimension = v;
    }
    if let Some(v) = env::path("CAPTURE_OUTPUT_DIR") {
        config.capture_output_dir = v;
    }
    if let Some(v) = env::string("VISION_MODEL") {
        config.vision_model = v;
    }
    if let Some(v) = env::string("PREDICTION_MODEL") {
        config.prediction_model = v;
    }
    if let Some(v) = env::string("IMAGE_MODEL") {
        config.image_model = v;
    }
    if let Some(v) = env::string("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(v);
    }
    Ok(())
}

/// Apply the values present in the YAML file.
fn apply_yaml(config: &mut AppConfig, yaml: YamlConfig) -> Result<(), String> {
    if let Some(server) = yaml.server {
        if let Some(v) = server.host {
            config.host = v;
        }
        if let Some(v) = server.port {
            config.port = v;
        }
        if let Some(v) = server.cors_allowed_origins {
            config.cors_allowed_origins = Some(v);
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(v) = openai.api_key {
            config.openai_api_key = Some(v);
        }
        if let Some(v) = openai.api_base {
            config.openai_api_base = v;
        }
        if let Some(v) = openai.realtime_model {
            config.realtime_model = v;
        }
        if let Some(v) = openai.realtime_url {
            config.realtime_url = v;
        }
        if let Some(v) = openai.voice {
            config.realtime_voice = Some(parse_voice(&v)?);
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(v) = realtime.token_url {
            config.token_url = Some(v);
        }
        if let Some(v) = realtime.data_channel_label {
            config.data_channel_label = v;
        }
        if let Some(v) = realtime.ice_servers {
            config.ice_servers = v;
        }
        if let Some(v) = realtime.ice_gathering_timeout_ms {
            config.ice_gathering_timeout_ms = v;
        }
        if let Some(v) = realtime.event_log_capacity {
            config.event_log_capacity = v;
        }
        if let Some(v) = realtime.instructions_path {
            config.instructions_path = Some(PathBuf::from(v));
        }
    }

    if let Some(tools) = yaml.tools {
        if let Some(v) = tools.camera_snapshot_path {
            config.camera_snapshot_path = PathBuf::from(v);
        }
        if let Some(v) = tools.camera_max_dimension {
            config.camera_max_dimension = v;
        }
        if let Some(v) = tools.capture_output_dir {
            config.capture_output_dir = PathBuf::from(v);
        }
        if let Some(v) = tools.vision_model {
            config.vision_model = v;
        }
        if let Some(v) = tools.prediction_model {
            config.prediction_model = v;
        }
        if let Some(v) = tools.image_model {
            config.image_model = v;
        }
    }
    Ok(())
}

/// Defaults, then environment, then YAML.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = defaults();
    apply_env(&mut config)?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}
