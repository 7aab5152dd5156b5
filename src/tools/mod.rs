//! MCP tool handlers.
//!
//! Each handler takes the shared search session and a deserialized request,
//! and returns the text shown to the client.

pub mod preload;
pub mod search;
pub mod status;
