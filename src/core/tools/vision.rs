//! Image description and transformation backends for the camera tools.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use zeroize::Zeroizing;

use super::camera::CapturedFrame;
use super::{ToolError, ToolResult};
use crate::core::realtime::openai::OPENAI_API_BASE;
use crate::utils::{describe_failure, join_path};

/// Default model for scene descriptions.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
/// Default model for future predictions.
pub const DEFAULT_PREDICTION_MODEL: &str = "gpt-4o";
/// Default image-edit model for the robot's-eye view.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

const MAX_DESCRIPTION_TOKENS: u32 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// External service that looks at or transforms a captured frame.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Text about `frame`, produced by `model` under `system_prompt`.
    async fn describe(
        &self,
        frame: &CapturedFrame,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> ToolResult<String>;

    /// A new PNG image derived from `frame` according to `prompt`.
    async fn stylize(&self, frame: &CapturedFrame, prompt: &str) -> ToolResult<Bytes>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

/// [`VisionBackend`] backed by the OpenAI chat-completions and image-edit APIs.
pub struct OpenAIVisionClient {
    http_client: reqwest::Client,
    api_key: Zeroizing<String>,
    api_base: String,
    image_model: String,
}

impl std::fmt::Debug for OpenAIVisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIVisionClient")
            .field("api_base", &self.api_base)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl OpenAIVisionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    pub fn with_client(http_client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: Zeroizing::new(api_key.into()),
            api_base: OPENAI_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    async fn read_success(response: reqwest::Response) -> ToolResult<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Backend(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(ToolError::Backend(describe_failure(status, &body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl VisionBackend for OpenAIVisionClient {
    async fn describe(
        &self,
        frame: &CapturedFrame,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> ToolResult<String> {
        let request = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": user_prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": frame.data_url(), "detail": "low" }
                        }
                    ]
                }
            ],
            "max_tokens": MAX_DESCRIPTION_TOKENS,
        });

        debug!("Requesting image description from {}", model);
        let response = self
            .http_client
            .post(join_path(&self.api_base, "chat/completions"))
            .bearer_auth(self.api_key.as_str())
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| ToolError::Backend(format!("Request failed: {e}")))?;

        let body = Self::read_success(response).await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::Backend(format!("Failed to parse completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ToolError::Backend("Completion contained no text".to_string()))
    }

    async fn stylize(&self, frame: &CapturedFrame, prompt: &str) -> ToolResult<Bytes> {
        let image = Part::bytes(frame.jpeg.to_vec())
            .file_name("capture.jpg")
            .mime_str(frame.mime_type())
            .map_err(|e| ToolError::Backend(format!("Failed to set MIME type: {e}")))?;
        let form = Form::new()
            .text("model", self.image_model.clone())
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .part("image", image);

        debug!("Requesting image edit from {}", self.image_model);
        let response = self
            .http_client
            .post(join_path(&self.api_base, "images/edits"))
            .bearer_auth(self.api_key.as_str())
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ToolError::Backend(format!("Request failed: {e}")))?;

        let body = Self::read_success(response).await?;
        let parsed: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| ToolError::Backend(format!("Failed to parse image response: {e}")))?;
        let encoded = parsed
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| ToolError::Backend("Image response contained no data".to_string()))?;

        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(|e| ToolError::Backend(format!("Image data is not valid base64: {e}")))
    }
}
