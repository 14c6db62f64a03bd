//! Pipeline controller: one description in, one video (or one error) out.
//!
//! Stages run strictly in order and each is a hard gate:
//!
//! ```text
//! Received → Generating → Validating → Sanitizing → Persisting → Rendering → Locating → Succeeded
//! ```
//!
//! Any failure moves the invocation to `Failed`. Nothing is retried and no
//! partial result is returned.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::domain::{AnimationRequest, GenerationResult, JobId, PipelineError};
use crate::generator::{SceneGenerator, SCENE_CLASS};
use crate::metrics::METRICS;
use crate::obs;
use crate::render::{ArtifactLocator, RenderError, RenderInvoker};
use crate::sanitizer::sanitize;
use crate::validator::validate;
use crate::workspace::{PruneResult, RetentionPolicy, Workspace, WorkspaceError};

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Generating,
    Validating,
    Sanitizing,
    Persisting,
    Rendering,
    Locating,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Generating => "generating",
            Stage::Validating => "validating",
            Stage::Sanitizing => "sanitizing",
            Stage::Persisting => "persisting",
            Stage::Rendering => "rendering",
            Stage::Locating => "locating",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        }
    }

    /// True for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource limits for the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineLimits {
    /// Renders allowed to run at the same time (at least 1).
    pub max_concurrent_renders: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 2,
        }
    }
}

/// A successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutput {
    pub job_id: JobId,
    pub artifact_path: PathBuf,
    pub scene_logic: Vec<String>,
    /// Final sanitized script text.
    pub scene_code: String,
    pub script_digest: String,
    pub duration_ms: u64,
}

/// A failed invocation: the stage it failed in and the internal error.
#[derive(Debug, thiserror::Error)]
#[error("job {job_id} failed while {stage}: {error}")]
pub struct PipelineFailure {
    pub job_id: JobId,
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

/// Composes generator, validator, sanitizer, renderer and locator.
pub struct AnimationPipeline {
    generator: Arc<dyn SceneGenerator>,
    invoker: RenderInvoker,
    locator: ArtifactLocator,
    workspace: Workspace,
    render_permits: Semaphore,
    /// Jobs between start and terminal state; their areas are never pruned.
    in_flight: Mutex<HashSet<JobId>>,
}

impl AnimationPipeline {
    /// The artifact locator follows the invoker's quality and output naming.
    pub fn new(
        generator: Arc<dyn SceneGenerator>,
        invoker: RenderInvoker,
        workspace: Workspace,
        limits: PipelineLimits,
    ) -> Self {
        let locator = ArtifactLocator::for_config(invoker.config());
        Self {
            generator,
            invoker,
            locator,
            workspace,
            render_permits: Semaphore::new(limits.max_concurrent_renders.max(1)),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run one full invocation for `request`.
    pub async fn run(&self, request: &AnimationRequest) -> Result<PipelineOutput, PipelineFailure> {
        let job_id = JobId::new();
        let span = obs::job_span(&job_id);
        let _in_flight = InFlight::register(&self.in_flight, job_id);

        async {
            obs::emit_job_started(
                &job_id,
                self.generator.name(),
                request.description().chars().count(),
            );
            let mut tracker = StageTracker::new(job_id);
            let result = self.generate_and_render(&mut tracker, request).await;
            tracker.finish(result)
        }
        .instrument(span)
        .await
    }

    /// Sanitize and render an existing script, skipping generation.
    pub async fn render_script(
        &self,
        code: &str,
        scene_class: &str,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let job_id = JobId::new();
        let span = obs::job_span(&job_id);
        let _in_flight = InFlight::register(&self.in_flight, job_id);

        async {
            obs::emit_job_started(&job_id, "script", code.chars().count());
            let mut tracker = StageTracker::new(job_id);
            let generation = GenerationResult {
                scene_logic: Vec::new(),
                scene_code: code.to_string(),
            };
            let result = self.render_generation(&mut tracker, generation, scene_class).await;
            tracker.finish(result)
        }
        .instrument(span)
        .await
    }

    async fn generate_and_render(
        &self,
        tracker: &mut StageTracker,
        request: &AnimationRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        tracker.enter(Stage::Generating);
        let raw = self.generator.generate(request.description()).await?;

        tracker.enter(Stage::Validating);
        let generation = validate(&raw).map_err(|err| {
            obs::emit_rejected_output(&tracker.job_id, err.is_schema_violation(), &err.raw);
            err
        })?;

        self.render_generation(tracker, generation, SCENE_CLASS).await
    }

    async fn render_generation(
        &self,
        tracker: &mut StageTracker,
        generation: GenerationResult,
        scene_class: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        tracker.enter(Stage::Sanitizing);
        let script = sanitize(&generation.scene_code);
        let script_digest = script.digest();

        tracker.enter(Stage::Persisting);
        let area = self.workspace.create(tracker.job_id)?;
        area.persist(&script).await?;

        tracker.enter(Stage::Rendering);
        let outcome = {
            let _permit = self
                .render_permits
                .acquire()
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?;
            self.invoker.render(&area.script_path, scene_class).await
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(RenderError::Timeout { limit_ms }) => {
                METRICS.inc_render_timeouts();
                return Err(PipelineError::RenderTimeout { limit_ms });
            }
            Err(err @ RenderError::Spawn { .. }) => {
                return Err(PipelineError::RenderFailed {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: err.to_string(),
                })
            }
            Err(err @ RenderError::InvalidScriptPath(_)) => {
                return Err(PipelineError::Internal(err.to_string()))
            }
        };
        obs::emit_render_finished(&tracker.job_id, outcome.exit_code, outcome.duration_ms);

        if !outcome.succeeded() {
            return Err(PipelineError::RenderFailed {
                exit_code: outcome.exit_code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            });
        }

        tracker.enter(Stage::Locating);
        let artifact_path = self
            .locator
            .locate(&area.script_path)
            .map_err(|missing| PipelineError::ArtifactMissing { path: missing.path })?;

        Ok(PipelineOutput {
            job_id: tracker.job_id,
            artifact_path,
            scene_logic: generation.scene_logic,
            scene_code: script.into_string(),
            script_digest,
            duration_ms: tracker.elapsed_ms(),
        })
    }

    /// Artifact of a finished invocation, if it exists.
    pub fn artifact_for(&self, job_id: JobId) -> Option<PathBuf> {
        self.locator
            .locate(&self.workspace.area(job_id).script_path)
            .ok()
    }

    /// Most recently produced artifact.
    pub fn latest_artifact(&self) -> Result<Option<(JobId, PathBuf)>, WorkspaceError> {
        self.workspace.latest_artifact(&self.locator)
    }

    /// Garbage-collect working areas, skipping those of unfinished jobs.
    ///
    /// Jobs that start during a prune wait for it to finish.
    pub fn prune(&self, policy: &RetentionPolicy) -> Result<PruneResult, WorkspaceError> {
        let in_flight = lock_jobs(&self.in_flight);
        let result = self.workspace.prune_except(policy, &in_flight)?;
        drop(in_flight);
        obs::emit_prune_finished(result.removed_count, result.remaining_count);
        Ok(result)
    }
}

fn lock_jobs(jobs: &Mutex<HashSet<JobId>>) -> MutexGuard<'_, HashSet<JobId>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a job as unfinished until dropped.
struct InFlight<'a> {
    jobs: &'a Mutex<HashSet<JobId>>,
    job_id: JobId,
}

impl<'a> InFlight<'a> {
    fn register(jobs: &'a Mutex<HashSet<JobId>>, job_id: JobId) -> Self {
        lock_jobs(jobs).insert(job_id);
        Self { jobs, job_id }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock_jobs(self.jobs).remove(&self.job_id);
    }
}

/// Current stage of one invocation, plus its clock.
struct StageTracker {
    job_id: JobId,
    stage: Stage,
    start: Instant,
}

impl StageTracker {
    fn new(job_id: JobId) -> Self {
        METRICS.inc_jobs_started();
        Self {
            job_id,
            stage: Stage::Received,
            start: Instant::now(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        obs::emit_stage_entered(&self.job_id, stage.as_str());
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Log the terminal transition and attach the failing stage.
    fn finish(
        mut self,
        result: Result<PipelineOutput, PipelineError>,
    ) -> Result<PipelineOutput, PipelineFailure> {
        match result {
            Ok(output) => {
                self.enter(Stage::Succeeded);
                METRICS.inc_jobs_succeeded();
                obs::emit_job_succeeded(&self.job_id, output.duration_ms, &output.script_digest);
                Ok(output)
            }
            Err(error) => {
                let failed_at = self.stage;
                if let PipelineError::RenderFailed {
                    exit_code,
                    stdout,
                    stderr,
                } = &error
                {
                    obs::emit_render_diagnostics(&self.job_id, *exit_code, stdout, stderr);
                }
                METRICS.inc_jobs_failed();
                obs::emit_job_failed(&self.job_id, failed_at.as_str(), error.kind(), &error);
                self.enter(Stage::Failed);
                Err(PipelineFailure {
                    job_id: self.job_id,
                    stage: failed_at,
                    error,
                })
            }
        }
    }
}
