pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::AppConfig;
pub use crate::core::{
    RealtimeError, RealtimeResult, SessionController, SessionState, ToolDefinition, ToolRegistry,
};
pub use errors::app_error::{AppError, AppResult};
pub use state::AppState;
