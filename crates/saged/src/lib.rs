//! Sage daemon library - exposes modules for testing.

pub mod api_error;
pub mod config;
pub mod identity;
pub mod routes;
pub mod server;
