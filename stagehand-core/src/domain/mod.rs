//! Core domain types
//!
//! This module contains the core domain structures used across Stagehand.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for execution and persistence) and transport layers.

pub mod event;
pub mod log;
pub mod pipeline;
pub mod stage;
pub mod user;
