//! Vigil daemon library - exposes modules for testing.

pub mod analysis;
pub mod broadcast;
pub mod collection;
pub mod config;
pub mod error;
pub mod ollama;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;
pub mod targets;
