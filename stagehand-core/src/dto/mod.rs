//! Data Transfer Objects
//!
//! Request and response shapes exchanged between transport layers (HTTP,
//! WebSocket) and the orchestration engine.

pub mod pipeline;
pub mod user;
