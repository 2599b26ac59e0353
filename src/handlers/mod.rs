//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `token` - Ephemeral realtime credential minting
//! - `session` - Session lifecycle and client event sends
//! - `events` - Read-only view of the event log

pub mod api;
pub mod events;
pub mod session;
pub mod token;
