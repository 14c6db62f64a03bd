//! Structured observability hooks for pipeline invocations.
//!
//! This module provides:
//! - Job-scoped tracing spans via `JobSpan` RAII guard
//! - Emission functions for key lifecycle events: start, stage transition,
//!   render completion, success and failure
//!
//! Events are emitted at `info!` level, failures at `warn!`, and captured
//! renderer output at `error!`.

use tracing::{error, info, warn};

use crate::domain::{ErrorKind, JobId};

/// RAII guard that enters a job-scoped tracing span.
///
/// Only for synchronous sections; async code should use
/// [`job_span`] with `tracing::Instrument`.
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    /// Create and enter a span tagged with the job id.
    pub fn enter(job_id: &JobId) -> Self {
        Self {
            _span: job_span(job_id).entered(),
        }
    }
}

/// Span tagged with the job id.
pub fn job_span(job_id: &JobId) -> tracing::Span {
    tracing::info_span!("scenecraft.job", job_id = %job_id)
}

/// Emit event: job accepted.
pub fn emit_job_started(job_id: &JobId, generator: &str, description_chars: usize) {
    info!(
        event = "job.started",
        job_id = %job_id,
        generator = %generator,
        description_chars = description_chars,
    );
}

/// Emit event: pipeline moved to a new stage.
pub fn emit_stage_entered(job_id: &JobId, stage: &str) {
    info!(event = "job.stage", job_id = %job_id, stage = %stage);
}

/// Emit the raw model text of a rejected response (warning level).
pub fn emit_rejected_output(job_id: &JobId, schema_violation: bool, raw: &str) {
    warn!(
        event = "generation.rejected",
        job_id = %job_id,
        schema_violation = schema_violation,
        raw = %raw,
    );
}

/// Emit event: renderer process exited.
pub fn emit_render_finished(job_id: &JobId, exit_code: i32, duration_ms: u64) {
    info!(
        event = "render.finished",
        job_id = %job_id,
        exit_code = exit_code,
        duration_ms = duration_ms,
    );
}

/// Emit the renderer's full captured output after a failed render.
pub fn emit_render_diagnostics(job_id: &JobId, exit_code: i32, stdout: &str, stderr: &str) {
    error!(
        event = "render.diagnostics",
        job_id = %job_id,
        exit_code = exit_code,
        stdout = %stdout,
        stderr = %stderr,
    );
}

/// Emit event: job finished with an artifact.
pub fn emit_job_succeeded(job_id: &JobId, duration_ms: u64, script_digest: &str) {
    info!(
        event = "job.succeeded",
        job_id = %job_id,
        duration_ms = duration_ms,
        script_digest = %script_digest,
    );
}

/// Emit event: job failed (warning level).
pub fn emit_job_failed(job_id: &JobId, stage: &str, kind: ErrorKind, error: &dyn std::fmt::Display) {
    warn!(
        event = "job.failed",
        job_id = %job_id,
        stage = %stage,
        kind = kind.as_str(),
        error = %error,
    );
}

/// Emit event: working-area garbage collection pass completed.
pub fn emit_prune_finished(removed_count: usize, remaining_count: usize) {
    info!(
        event = "workspace.pruned",
        removed = removed_count,
        remaining = remaining_count,
    );
}
