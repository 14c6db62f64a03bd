//! Per-invocation working areas.
//!
//! Every pipeline invocation gets its own directory, named by its [`JobId`],
//! holding the script and the renderer's media tree. Concurrent invocations
//! therefore never share a script or an artifact path.
//!
//! Layout: `<root>/<job id>/generated_scene.py`

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::JobId;
use crate::render::ArtifactLocator;
use crate::sanitizer::SanitizedScript;

/// File name of the persisted script inside a working area.
pub const SCRIPT_FILE: &str = "generated_scene.py";

/// Errors from working-area management.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// One invocation's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkArea {
    pub job_id: JobId,
    pub dir: PathBuf,
    pub script_path: PathBuf,
}

impl WorkArea {
    fn new(root: &Path, job_id: JobId) -> Self {
        let dir = root.join(job_id.to_string());
        let script_path = dir.join(SCRIPT_FILE);
        Self {
            job_id,
            dir,
            script_path,
        }
    }

    /// Write the script into this area, replacing any previous one.
    pub async fn persist(&self, script: &SanitizedScript) -> Result<()> {
        tokio::fs::write(&self.script_path, script.as_str())
            .await
            .map_err(|e| WorkspaceError::io(&self.script_path, e))
    }
}

/// Garbage-collection bounds for working areas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Remove areas older than this many seconds.
    pub max_age_secs: Option<u64>,
    /// Keep at most this many areas (oldest removed first).
    pub max_areas: Option<usize>,
    /// Never remove areas younger than this many seconds.
    pub min_age_secs: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_secs: Some(24 * 60 * 60),
            max_areas: Some(50),
            min_age_secs: 600,
        }
    }
}

/// Result of a prune pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneResult {
    pub removed_count: usize,
    pub remaining_count: usize,
    pub removed_ids: Vec<JobId>,
}

/// Root directory holding all working areas.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open `root`, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| WorkspaceError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh working area with a new id.
    pub fn allocate(&self) -> Result<WorkArea> {
        self.create(JobId::new())
    }

    /// Create the working area for `job_id`.
    pub fn create(&self, job_id: JobId) -> Result<WorkArea> {
        let area = WorkArea::new(&self.root, job_id);
        fs::create_dir_all(&area.dir).map_err(|e| WorkspaceError::io(&area.dir, e))?;
        Ok(area)
    }

    /// Working area for `job_id`. Does not touch the filesystem.
    pub fn area(&self, job_id: JobId) -> WorkArea {
        WorkArea::new(&self.root, job_id)
    }

    /// All working areas with their last-modified time.
    ///
    /// Entries under the root whose names are not job ids are ignored.
    pub fn list(&self) -> Result<Vec<(JobId, DateTime<Utc>)>> {
        let entries = fs::read_dir(&self.root).map_err(|e| WorkspaceError::io(&self.root, e))?;

        let mut areas = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WorkspaceError::io(&self.root, e))?;
            let Some(job_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<JobId>().ok())
            else {
                continue;
            };
            let metadata = entry
                .metadata()
                .map_err(|e| WorkspaceError::io(&entry.path(), e))?;
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            areas.push((job_id, DateTime::<Utc>::from(modified)));
        }
        Ok(areas)
    }

    /// Most recently written artifact across all areas.
    pub fn latest_artifact(&self, locator: &ArtifactLocator) -> Result<Option<(JobId, PathBuf)>> {
        let mut latest: Option<(SystemTime, JobId, PathBuf)> = None;

        for (job_id, _) in self.list()? {
            let Ok(path) = locator.locate(&self.area(job_id).script_path) else {
                continue;
            };
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if latest.as_ref().map_or(true, |(t, _, _)| modified > *t) {
                latest = Some((modified, job_id, path));
            }
        }

        Ok(latest.map(|(_, job_id, path)| (job_id, path)))
    }

    /// Remove working areas according to `policy`:
    /// 1. areas older than `max_age_secs`
    /// 2. excess areas beyond `max_areas` (oldest first)
    ///
    /// Areas younger than `min_age_secs` are never removed. An age too large
    /// to subtract from the current time sets no cutoff.
    pub fn prune(&self, policy: &RetentionPolicy) -> Result<PruneResult> {
        self.prune_except(policy, &HashSet::new())
    }

    /// Like [`Workspace::prune`], but never removes the areas in `keep`.
    ///
    /// Areas in `keep` still count toward `max_areas`.
    pub fn prune_except(&self, policy: &RetentionPolicy, keep: &HashSet<JobId>) -> Result<PruneResult> {
        let now = Utc::now();
        // None: nothing is old enough to lose protection.
        let protect_after = cutoff(now, policy.min_age_secs);
        let removable = |id: &JobId, ts: &DateTime<Utc>| {
            !keep.contains(id) && protect_after.is_some_and(|limit| *ts < limit)
        };

        let mut areas = self.list()?;
        // Oldest first, then id for deterministic tie-breaking.
        areas.sort_by(|(id_a, ts_a), (id_b, ts_b)| ts_a.cmp(ts_b).then_with(|| id_a.cmp(id_b)));

        let mut doomed: Vec<JobId> = Vec::new();

        if let Some(max_age) = policy.max_age_secs.and_then(|secs| cutoff(now, secs)) {
            doomed.extend(
                areas
                    .iter()
                    .filter(|(id, ts)| *ts < max_age && removable(id, ts))
                    .map(|(id, _)| *id),
            );
        }

        if let Some(max_areas) = policy.max_areas {
            let survivors: Vec<&(JobId, DateTime<Utc>)> =
                areas.iter().filter(|(id, _)| !doomed.contains(id)).collect();
            if survivors.len() > max_areas {
                let excess = survivors.len() - max_areas;
                doomed.extend(
                    survivors
                        .into_iter()
                        .filter(|(id, ts)| removable(id, ts))
                        .take(excess)
                        .map(|(id, _)| *id),
                );
            }
        }

        for job_id in &doomed {
            let dir = self.area(*job_id).dir;
            fs::remove_dir_all(&dir).map_err(|e| WorkspaceError::io(&dir, e))?;
        }

        Ok(PruneResult {
            removed_count: doomed.len(),
            remaining_count: areas.len() - doomed.len(),
            removed_ids: doomed,
        })
    }
}

/// `now - secs`, or `None` when that is not representable.
fn cutoff(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|age| now.checked_sub_signed(age))
}
