//! The three camera tools Ambit advertises to the model.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::camera::Camera;
use super::vision::{DEFAULT_PREDICTION_MODEL, DEFAULT_VISION_MODEL, VisionBackend};
use super::{
    ToolDefinition, ToolError, ToolHandler, ToolOutput, ToolRegistry, ToolResult, user_prompt,
};
use crate::core::persona;

pub const DESCRIBE_PHOTO: &str = "take_and_describe_photo";
pub const ROBOT_PERSPECTIVE: &str = "show_me_from_your_perspective";
pub const PREDICT_FUTURE: &str = "predict_future_from_photo";

/// Schema for a tool that takes no arguments.
fn empty_parameters() -> Value {
    json!({ "type": "object", "strict": true, "properties": {}, "required": [] })
}

/// Models used by the describing tools.
#[derive(Debug, Clone)]
pub struct VisionModels {
    pub describe: String,
    pub predict: String,
}

impl Default for VisionModels {
    fn default() -> Self {
        Self {
            describe: DEFAULT_VISION_MODEL.to_string(),
            predict: DEFAULT_PREDICTION_MODEL.to_string(),
        }
    }
}

/// Capture a photo and describe it in character.
pub struct DescribePhotoTool {
    camera: Arc<dyn Camera>,
    backend: Arc<dyn VisionBackend>,
    model: String,
}

impl DescribePhotoTool {
    pub fn new(camera: Arc<dyn Camera>, backend: Arc<dyn VisionBackend>, model: String) -> Self {
        Self {
            camera,
            backend,
            model,
        }
    }
}

#[async_trait]
impl ToolHandler for DescribePhotoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            DESCRIBE_PHOTO,
            "Call when the user asks 'What do you see?'. Captures a webcam photo, sends it to GPT-4o-mini, and returns the description.",
        )
        .with_parameters(empty_parameters())
    }

    async fn call(&self, arguments: Value) -> ToolResult<ToolOutput> {
        let frame = self.camera.capture().await?;
        let prompt = match user_prompt(&arguments) {
            Some(asked) => format!(
                "User's request: '{asked}'. Analyze the user-provided image and respond in character."
            ),
            None => "What do you see? Respond in character.".to_string(),
        };
        let text = self
            .backend
            .describe(&frame, persona::DESCRIBE_PROMPT, &prompt, &self.model)
            .await?;
        Ok(ToolOutput::Text(text))
    }
}

/// Capture a photo and re-render it the way a robot would see it.
pub struct RobotPerspectiveTool {
    camera: Arc<dyn Camera>,
    backend: Arc<dyn VisionBackend>,
    output_dir: PathBuf,
}

impl RobotPerspectiveTool {
    pub fn new(
        camera: Arc<dyn Camera>,
        backend: Arc<dyn VisionBackend>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            camera,
            backend,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for RobotPerspectiveTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            ROBOT_PERSPECTIVE,
            "Captures a webcam photo and uses GPT-Image-1 to recreate how a stereotypical robot would see it (metallic, glitchy, infrared).",
        )
        .with_parameters(empty_parameters())
    }

    async fn call(&self, arguments: Value) -> ToolResult<ToolOutput> {
        let frame = self.camera.capture().await?;
        let prompt = match user_prompt(&arguments) {
            Some(extra) => format!("{}\n{extra}", persona::ROBOT_VISION_PROMPT),
            None => persona::ROBOT_VISION_PROMPT.to_string(),
        };
        let png = self.backend.stylize(&frame, &prompt).await?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ToolError::Backend(format!("Failed to create output dir: {e}")))?;
        let path = self
            .output_dir
            .join(format!("robot_view_{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &png)
            .await
            .map_err(|e| ToolError::Backend(format!("Failed to save image: {e}")))?;

        info!("Saved robot view to {}", path.display());
        Ok(ToolOutput::Image {
            uri: path.display().to_string(),
            mime_type: "image/png".to_string(),
        })
    }
}

/// Capture a photo and make a dramatic prediction about the people in it.
pub struct PredictFutureTool {
    camera: Arc<dyn Camera>,
    backend: Arc<dyn VisionBackend>,
    model: String,
}

impl PredictFutureTool {
    pub fn new(camera: Arc<dyn Camera>, backend: Arc<dyn VisionBackend>, model: String) -> Self {
        Self {
            camera,
            backend,
            model,
        }
    }
}

#[async_trait]
impl ToolHandler for PredictFutureTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            PREDICT_FUTURE,
            "Captures a webcam photo and uses GPT-4o to predict the future of the person or people shown in a dramatically funny way.",
        )
    }

    async fn call(&self, arguments: Value) -> ToolResult<ToolOutput> {
        let frame = self.camera.capture().await?;
        let mut prompt = "Predict the future of the person or people in this photo.".to_string();
        if let Some(asked) = user_prompt(&arguments) {
            prompt.push_str(&format!(" They asked: '{asked}'."));
        }
        let mut text = self
            .backend
            .describe(&frame, persona::PREDICTION_PROMPT, &prompt, &self.model)
            .await?;
        if !text.starts_with(persona::PREDICTION_OPENING) {
            text = format!("{} {text}", persona::PREDICTION_OPENING);
        }
        Ok(ToolOutput::Text(text))
    }
}

/// Registry with the three built-in tools, in advertisement order.
pub fn default_registry(
    camera: Arc<dyn Camera>,
    backend: Arc<dyn VisionBackend>,
    models: VisionModels,
    output_dir: impl Into<PathBuf>,
) -> ToolResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DescribePhotoTool::new(
        camera.clone(),
        backend.clone(),
        models.describe,
    )))?;
    registry.register(Arc::new(RobotPerspectiveTool::new(
        camera.clone(),
        backend.clone(),
        output_dir,
    )))?;
    registry.register(Arc::new(PredictFutureTool::new(
        camera,
        backend,
        models.predict,
    )))?;
    Ok(registry)
}
