//! Domain types shared by every pipeline stage.

pub mod error;
pub mod generation;
pub mod request;

pub use error::{ErrorKind, PipelineError};
pub use generation::GenerationResult;
pub use request::{AnimationRequest, JobId, MAX_DESCRIPTION_CHARS};
