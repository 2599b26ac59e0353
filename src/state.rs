use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core::persona;
use crate::core::realtime::transport::{HttpCredentialProvider, HttpSignalingClient};
use crate::core::realtime::{SessionController, WebRtcNegotiator};
use crate::core::tools::builtin::{VisionModels, default_registry};
use crate::core::tools::{OpenAIVisionClient, SnapshotCamera, ToolRegistry};
use crate::errors::{AppError, AppResult};

/// Shared state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub http_client: reqwest::Client,
    pub controller: SessionController,
}

impl AppState {
    /// Wire the WebRTC negotiator, the built-in tools and the session
    /// controller from `config`.
    pub async fn new(config: AppConfig) -> AppResult<Arc<Self>> {
        let http_client = reqwest::Client::new();

        let instructions = persona::load_instructions(config.instructions_path.as_deref())
            .map_err(|e| AppError::Internal(format!("Failed to read instructions: {e}")))?;

        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; /token and the vision tools will fail");
        }

        let registry = Self::build_registry(&config, &http_client)?;
        let token_url = config.resolved_token_url();
        info!(
            "Realtime model {} via {}, credentials from {}",
            config.realtime_model, config.realtime_url, token_url
        );

        let negotiator = WebRtcNegotiator::new(
            Arc::new(HttpCredentialProvider::with_client(
                http_client.clone(),
                token_url,
            )),
            Arc::new(HttpSignalingClient::with_client(
                http_client.clone(),
                config.realtime_url.clone(),
                config.realtime_model.clone(),
            )),
        )
        .with_config(config.peer_config());

        let controller = SessionController::builder(Arc::new(negotiator))
            .tools(Arc::new(registry))
            .instructions(instructions)
            .voice(config.realtime_voice)
            .log_capacity(config.event_log_capacity)
            .build();

        Ok(Self::with_controller(config, http_client, controller))
    }

    /// State around an already-built controller.
    pub fn with_controller(
        config: AppConfig,
        http_client: reqwest::Client,
        controller: SessionController,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            http_client,
            controller,
        })
    }

    /// Built-in tool registry backed by the configured camera and vision API.
    pub fn build_registry(
        config: &AppConfig,
        http_client: &reqwest::Client,
    ) -> AppResult<ToolRegistry> {
        let camera = SnapshotCamera::new(config.camera_snapshot_path.clone())
            .with_max_dimension(config.camera_max_dimension);
        let vision = OpenAIVisionClient::with_client(
            http_client.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
        )
        .with_api_base(config.openai_api_base.clone())
        .with_image_model(config.image_model.clone());

        let models = VisionModels {
            describe: config.vision_model.clone(),
            predict: config.prediction_model.clone(),
        };

        default_registry(
            Arc::new(camera),
            Arc::new(vision),
            models,
            config.capture_output_dir.clone(),
        )
        .map_err(|e| AppError::Internal(format!("Failed to register tools: {e}")))
    }
}
