use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   cors_allowed_origins: "http://localhost:5173"
///
/// openai:
///   api_key: "sk-..."
///   api_base: "https://api.openai.com/v1"
///   realtime_model: "gpt-4o-realtime-preview-2024-12-17"
///   realtime_url: "https://api.openai.com/v1/realtime"
///   voice: "verse"
///
/// realtime:
///   token_url: "http://127.0.0.1:3001/token"
///   data_channel_label: "oai-events"
///   ice_servers:
///     - "stun:stun.l.google.com:19302"
///   ice_gathering_timeout_ms: 5000
///   event_log_capacity: 500
///   instructions_path: "persona.txt"
///
/// tools:
///   camera_snapshot_path: "captures/latest.jpg"
///   camera_max_dimension: 1024
///   capture_output_dir: "captures"
///   vision_model: "gpt-4o-mini"
///   prediction_model: "gpt-4o"
///   image_model: "gpt-image-1"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub tools: Option<ToolsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_allowed_origins: Option<String>,
}

/// OpenAI credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_url: Option<String>,
    pub voice: Option<String>,
}

/// Realtime transport settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub token_url: Option<String>,
    pub data_channel_label: Option<String>,
    pub ice_servers: Option<Vec<String>>,
    pub ice_gathering_timeout_ms: Option<u64>,
    pub event_log_capacity: Option<usize>,
    pub instructions_path: Option<String>,
}

/// Camera and vision tool settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsYaml {
    pub camera_snapshot_path: Option<String>,
    pub camera_max_dimension: Option<u32>,
    pub capture_output_dir: Option<String>,
    pub vision_model: Option<String>,
    pub prediction_model: Option<String>,
    pub image_model: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 4000
  cors_allowed_origins: "*"

openai:
  api_key: "sk-yaml"
  voice: "coral"

realtime:
  ice_servers:
    - "stun:stun.example.com:3478"
    - "turn:turn.example.com:3478"
  event_log_capacity: 200

tools:
  camera_snapshot_path: "/tmp/frame.jpg"
  camera_max_dimension: 512
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(4000));
        assert_eq!(server.cors_allowed_origins, Some("*".to_string()));

        let openai = config.openai.unwrap();
        assert_eq!(openai.api_key, Some("sk-yaml".to_string()));
        assert_eq!(openai.voice, Some("coral".to_string()));
        assert!(openai.api_base.is_none());

        let realtime = config.realtime.unwrap();
        assert_eq!(realtime.ice_servers.map(|s| s.len()), Some(2));
        assert_eq!(realtime.event_log_capacity, Some(200));

        let tools = config.tools.unwrap();
        assert_eq!(tools.camera_max_dimension, Some(512));
        assert!(tools.vision_model.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.openai.is_none());
        assert!(config.realtime.is_none());
        assert!(config.tools.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
