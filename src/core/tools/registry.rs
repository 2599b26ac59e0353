use std::collections::HashMap;
use std::sync::Arc;

use super::{ToolDefinition, ToolError, ToolHandler, ToolResult};

/// Name-keyed set of tool handlers.
///
/// Definitions are captured at registration and listed in registration order,
/// which is the order they are advertised in `session.update`.
#[derive(Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its definition's name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> ToolResult<()> {
        let definition = handler.definition();
        if self.handlers.contains_key(&definition.name) {
            return Err(ToolError::AlreadyRegistered(definition.name));
        }
        tracing::debug!("Registered tool: {}", definition.name);
        self.handlers.insert(definition.name.clone(), handler);
        self.definitions.push(definition);
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &self.definitions.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
