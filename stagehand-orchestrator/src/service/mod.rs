//! Service Module
//!
//! Engine layer of the orchestrator: per-pipeline orchestrators, the bounded
//! registry holding them, and the service that fronts both.

pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;

pub use error::{ErrorKind, OrchestratorError};
pub use orchestrator::PipelineOrchestrator;
pub use pipeline::PipelineService;
pub use registry::OrchestratorRegistry;
