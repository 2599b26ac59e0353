//! Configuration module for the Ambit console server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use ambit_realtime::config::AppConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = AppConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = AppConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::OpenAIRealtimeVoice;
use crate::core::realtime::PeerConfig;

/// Server configuration
///
/// Contains everything needed to run the console server:
/// - Server settings (host, port, CORS)
/// - OpenAI credentials and endpoints
/// - Realtime transport settings (data channel, ICE, event log)
/// - Camera and vision tool settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // OpenAI
    /// Server-side API key used to mint ephemeral realtime credentials and
    /// to call the vision endpoints
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub realtime_model: String,
    pub realtime_voice: Option<OpenAIRealtimeVoice>,
    /// Signaling endpoint receiving the SDP offer
    pub realtime_url: String,
    /// Where the negotiator fetches its credential. Defaults to this server's `/token`.
    pub token_url: Option<String>,

    // Transport
    pub data_channel_label: String,
    pub ice_servers: Vec<String>,
    pub ice_gathering_timeout_ms: u64,
    pub event_log_capacity: usize,

    // Persona and tools
    pub instructions_path: Option<PathBuf>,
    pub camera_snapshot_path: PathBuf,
    pub camera_max_dimension: u32,
    pub capture_output_dir: PathBuf,
    pub vision_model: String,
    pub prediction_model: String,
    pub image_model: String,

    // Security
    /// Comma-separated allowed origins, or `*`
    pub cors_allowed_origins: Option<String>,
}

impl Default for AppConfig {
    /// Built-in defaults without reading the environment. Not validated.
    fn default() -> Self {
        merge::defaults()
    }
}

/// Implement Drop to zeroize the API key when AppConfig is dropped.
impl Drop for AppConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables only
    ///
    /// Missing variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs, so by now it is part of the environment.
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credential endpoint for the negotiator.
    pub fn resolved_token_url(&self) -> String {
        match &self.token_url {
            Some(url) => url.clone(),
            None => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
                    other => other,
                };
                format!("http://{}:{}/token", host, self.port)
            }
        }
    }

    /// Peer connection settings.
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            data_channel_label: self.data_channel_label.clone(),
            ice_servers: self.ice_servers.clone(),
            ice_gathering_timeout: Duration::from_millis(self.ice_gathering_timeout_ms),
        }
    }
}
