//! Stagehand Core
//!
//! Core types shared by the Stagehand pipeline orchestration engine.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, StageRecord, User, etc.)
//!   and the status state machines
//! - DTOs: Request/response shapes used at the transport boundary

pub mod domain;
pub mod dto;
