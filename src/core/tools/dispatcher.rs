use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ToolError, ToolInvocation, ToolOutput, ToolRegistry, ToolResult};
use crate::core::realtime::ProtocolEvent;
use crate::core::realtime::openai::EventPayload;

/// Completion of one [`ToolInvocation`], success or failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub name: String,
    pub result: ToolResult<ToolOutput>,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The `output` string for the `function_call_output` item.
    pub fn output(&self) -> String {
        match &self.result {
            Ok(output) => output.to_output(),
            Err(err) => err.to_output(),
        }
    }

    /// The two events that complete the call on the remote side: the
    /// correlated `function_call_output` item, then `response.create`.
    pub fn into_events(self) -> [ProtocolEvent; 2] {
        let output = self.output();
        [
            ProtocolEvent::new(EventPayload::function_call_output(self.call_id, output)),
            ProtocolEvent::new(EventPayload::response_create()),
        ]
    }
}

/// Routes invocations to registered handlers.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run `invocation` to completion.
    ///
    /// Always yields exactly one outcome: unknown tools, unparsable arguments,
    /// handler errors and handler panics all become failure outcomes.
    pub async fn dispatch(&self, invocation: ToolInvocation) -> ToolOutcome {
        let arguments = invocation.parsed_arguments();
        let ToolInvocation { call_id, name, .. } = invocation;

        let result = match (self.registry.get(&name), arguments) {
            (None, _) => Err(ToolError::NotFound(name.clone())),
            (Some(_), Err(err)) => Err(err),
            (Some(handler), Ok(args)) => {
                debug!("Executing tool {} (call {})", name, call_id);
                // Handlers run on their own task so a panic is contained.
                match tokio::spawn(async move { handler.call(args).await }).await {
                    Ok(result) => result,
                    Err(join_err) => Err(ToolError::Backend(format!(
                        "tool handler aborted: {join_err}"
                    ))),
                }
            }
        };

        match &result {
            Ok(_) => info!("Tool {} completed (call {})", name, call_id),
            Err(err) => warn!("Tool {} failed (call {}): {}", name, call_id, err),
        }

        ToolOutcome {
            call_id,
            name,
            result,
        }
    }
}
