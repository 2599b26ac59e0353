pub mod persona;
pub mod realtime;
pub mod tools;

// Re-export commonly used types for convenience
pub use realtime::{
    RealtimeError, RealtimeResult, SessionController, SessionControllerBuilder, SessionState,
};
pub use tools::{ToolDefinition, ToolRegistry};
