//! Local tools the realtime model can call.
//!
//! A tool is a [`ToolHandler`] registered in a [`ToolRegistry`] under a
//! unique, case-sensitive name. The [`ToolDispatcher`] resolves each
//! [`ToolInvocation`] issued by the model and turns the handler's result into
//! a [`ToolOutcome`], which always renders to exactly one
//! `function_call_output` item followed by a `response.create`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ambit_realtime::core::tools::{ToolDispatcher, ToolInvocation, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(MyTool))?;
//! let dispatcher = ToolDispatcher::new(Arc::new(registry));
//!
//! let outcome = dispatcher
//!     .dispatch(ToolInvocation::new("call_1", "my_tool", "{}"))
//!     .await;
//! let [output, resume] = outcome.into_events();
//! ```

pub mod builtin;
pub mod camera;
mod dispatcher;
mod registry;
pub mod vision;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::realtime::openai::ToolDef;

pub use camera::{CapturedFrame, Camera, SnapshotCamera};
pub use dispatcher::{ToolDispatcher, ToolOutcome};
pub use registry::ToolRegistry;
pub use vision::{OpenAIVisionClient, VisionBackend};

// =============================================================================
// Error Types
// =============================================================================

/// Failures of a single tool invocation.
///
/// These never reach the local caller; they are rendered into the
/// function-call output sent back to the model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Error: Tool '{0}' not found.")]
    NotFound(String),

    #[error("Tool '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The camera could not produce a frame
    #[error("{0}")]
    CaptureUnavailable(String),

    /// The description/transform/prediction backend failed
    #[error("Backend error: {0}")]
    Backend(String),
}

impl ToolError {
    /// Stable error code used in the protocol payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "tool_not_found",
            Self::AlreadyRegistered(_) => "tool_already_registered",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::CaptureUnavailable(_) => "capture_unavailable",
            Self::Backend(_) => "backend_error",
        }
    }

    /// The `output` string sent to the model for this failure.
    pub fn to_output(&self) -> String {
        json!({
            "error": {
                "type": self.code(),
                "message": self.to_string(),
            }
        })
        .to_string()
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

// =============================================================================
// Definitions and Invocations
// =============================================================================

/// A capability advertised to the model during bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of accepted arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Wire form used inside `session.update`.
    pub fn to_wire(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            name: self.name.clone(),
            description: Some(self.description.clone()),
            parameters: self.parameters.clone(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Correlates the eventual output with the request
    pub call_id: String,
    pub name: String,
    /// Arguments as JSON text, exactly as received
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument text. Blank arguments mean an empty object.
    pub fn parsed_arguments(&self) -> ToolResult<Value> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }
}

/// Successful result of a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    /// Reference to an image written by the tool
    Image { uri: String, mime_type: String },
}

impl ToolOutput {
    /// The `output` string sent to the model.
    pub fn to_output(&self) -> String {
        match self {
            Self::Text(text) => json!({ "response": text }).to_string(),
            Self::Image { uri, mime_type } => {
                json!({ "image": uri, "mime_type": mime_type }).to_string()
            }
        }
    }
}

// =============================================================================
// Handler Trait
// =============================================================================

/// A local capability bound to a [`ToolDefinition`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. May suspend for capture or backend I/O.
    async fn call(&self, arguments: Value) -> ToolResult<ToolOutput>;
}

/// Optional `user_prompt` string argument accepted by the built-in tools.
pub(crate) fn user_prompt(arguments: &Value) -> Option<&str> {
    arguments
        .get("user_prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
