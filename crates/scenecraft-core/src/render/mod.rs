//! Rendering: run a script through the external toolchain and find its output.
//!
//! - [`invoker`]: `RenderConfig`, `Quality`, `RenderInvoker::render()`
//! - [`artifact`]: `ArtifactLocator` (naming convention + existence check)

pub mod artifact;
pub mod invoker;

pub use artifact::{ArtifactLocator, ArtifactMissing};
pub use invoker::{Quality, RenderConfig, RenderError, RenderInvoker, RenderOutcome};
