//! Scenecraft Core Library
//!
//! The generation-to-render pipeline: ask a model for an explanation and a
//! Manim script, repair and sanitize what comes back, render it in a child
//! process and hand back the resulting video.

pub mod domain;
pub mod fakes;
pub mod generator;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod render;
pub mod sanitizer;
pub mod telemetry;
pub mod validator;
pub mod workspace;

pub use domain::{
    AnimationRequest, ErrorKind, GenerationResult, JobId, PipelineError, MAX_DESCRIPTION_CHARS,
};

pub use generator::{GeminiConfig, GeminiGenerator, GeneratorError, SceneGenerator};
pub use pipeline::{AnimationPipeline, PipelineFailure, PipelineLimits, PipelineOutput, Stage};
pub use render::{
    ArtifactLocator, ArtifactMissing, Quality, RenderConfig, RenderError, RenderInvoker,
    RenderOutcome,
};
pub use sanitizer::{sanitize, SanitizedScript, MANIM_IMPORT, NUMPY_IMPORT};
pub use validator::{validate, ParseError, ParseFailure};
pub use workspace::{PruneResult, RetentionPolicy, WorkArea, Workspace, WorkspaceError};

pub use metrics::METRICS;
pub use obs::{
    emit_job_failed, emit_job_started, emit_job_succeeded, emit_prune_finished,
    emit_rejected_output, emit_render_diagnostics, emit_render_finished, emit_stage_entered, JobSpan,
};
pub use telemetry::init_tracing;

/// Scenecraft version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
