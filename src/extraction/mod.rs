//! Extraction pipeline: planning, backends, orchestration and merging.

pub mod backend;
mod command_tables;
mod document_ai;
mod error;
pub mod merger;
mod orchestrator;
pub mod planner;
pub mod retry;
mod router;
mod tesseract;

pub use backend::{BackendType, Capabilities, ExtractionBackend};
pub use command_tables::CommandTableBackend;
pub use document_ai::DocumentAiBackend;
pub use error::{BackendError, BackendErrorKind, OrchestrationError, PlanError};
pub use merger::ChunkOutcome;
pub use orchestrator::{ExtractionOutcome, OrchestrationState, Orchestrator};
pub use router::{BackendRouter, BackendStatus};
pub use tesseract::TesseractBackend;
