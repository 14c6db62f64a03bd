//! Observability tests for job lifecycle tracing.
//!
//! These verify that the emit functions and job spans can be driven under a
//! capturing subscriber, both directly and through full pipeline runs.

use std::sync::Arc;

use scenecraft_core::fakes::{FakeRenderer, StaticGenerator};
use scenecraft_core::{
    emit_job_failed, emit_job_started, emit_job_succeeded, emit_prune_finished,
    emit_rejected_output, emit_render_diagnostics, emit_render_finished, emit_stage_entered,
    AnimationPipeline, AnimationRequest, ErrorKind, JobId, JobSpan, PipelineLimits, RenderInvoker,
    Workspace, METRICS,
};
use tracing_test::traced_test;

/// Test: emit_job_started creates an info-level event
#[traced_test]
#[test]
fn test_emit_job_started_logs_generator() {
    emit_job_started(&JobId::new(), "gemini", 42);
}

#[traced_test]
#[test]
fn test_emit_stage_entered() {
    emit_stage_entered(&JobId::new(), "rendering");
}

/// Test: rejected output is logged at warn level with the raw text
#[traced_test]
#[test]
fn test_emit_rejected_output_logs_raw() {
    emit_rejected_output(&JobId::new(), false, "I'd rather write a poem.");
}

#[traced_test]
#[test]
fn test_emit_render_events() {
    let job_id = JobId::new();
    emit_render_finished(&job_id, 1, 1500);
    emit_render_diagnostics(&job_id, 1, "", "Traceback (most recent call last)");
}

#[traced_test]
#[test]
fn test_emit_job_terminal_events() {
    let job_id = JobId::new();
    emit_job_succeeded(&job_id, 3000, "ab12");
    emit_job_failed(&job_id, "rendering", ErrorKind::RenderFailed, &"exit 1");
    emit_prune_finished(3, 7);
}

#[traced_test]
#[test]
fn test_job_span_enter_creates_span() {
    let span = JobSpan::enter(&JobId::new());
    drop(span);
}

/// Test: a failing run under a capturing subscriber still reports its failure
#[traced_test]
#[tokio::test]
async fn test_failed_run_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    let config = FakeRenderer::Fails {
        exit_code: 3,
        stderr: "boom".to_string(),
    }
    .install(&dir.path().join("bin"))
    .unwrap();
    let pipeline = AnimationPipeline::new(
        Arc::new(StaticGenerator::new(
            r#"{"scene_logic": ["x"], "manim_code": "class GenScene(Scene): pass"}"#,
        )),
        RenderInvoker::new(config),
        Workspace::open(dir.path().join("jobs")).unwrap(),
        PipelineLimits::default(),
    );

    let before = METRICS.snapshot();
    let failure = pipeline
        .run(&AnimationRequest::new("anything").unwrap())
        .await
        .unwrap_err();
    let after = METRICS.snapshot();

    assert_eq!(failure.error.kind(), ErrorKind::RenderFailed);
    // Counters are process-wide; other tests may run concurrently.
    assert!(after.jobs_started > before.jobs_started);
    assert!(after.jobs_failed > before.jobs_failed);
}
