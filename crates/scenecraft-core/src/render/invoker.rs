//! Render invocation: one child process per script, output fully captured.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// Renderer quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// -ql, 854x480 at 15fps
    #[default]
    Low,

    /// -qm, 1280x720 at 30fps
    Medium,

    /// -qh, 1920x1080 at 60fps
    High,

    /// -qp, 2560x1440 at 60fps
    Production,

    /// -qk, 3840x2160 at 60fps
    FourK,
}

impl Quality {
    /// Command-line flag selecting this preset.
    pub fn flag(&self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
            Quality::Production => "-qp",
            Quality::FourK => "-qk",
        }
    }

    /// Subdirectory the renderer writes this preset's videos into.
    pub fn output_dir(&self) -> &'static str {
        match self {
            Quality::Low => "480p15",
            Quality::Medium => "720p30",
            Quality::High => "1080p60",
            Quality::Production => "1440p60",
            Quality::FourK => "2160p60",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Production => "production",
            Quality::FourK => "four_k",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Quality::Low),
            "medium" | "m" => Ok(Quality::Medium),
            "high" | "h" => Ok(Quality::High),
            "production" | "p" => Ok(Quality::Production),
            "four_k" | "4k" | "k" => Ok(Quality::FourK),
            other => Err(format!("unknown quality preset: {}", other)),
        }
    }
}

/// How to launch the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Executable to run.
    pub program: String,

    /// Arguments placed before the fixed invocation.
    pub program_args: Vec<String>,

    /// Quality preset.
    pub quality: Quality,

    /// File name the renderer is told to write.
    pub output_file: String,

    /// Wall-clock limit in seconds (0 = wait forever).
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "manim".to_string(),
            program_args: Vec::new(),
            quality: Quality::Low,
            output_file: "final_video.mp4".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Errors that prevent a render from producing an outcome at all.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to launch renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("script path has no file name: {}", .0.display())]
    InvalidScriptPath(PathBuf),
}

/// Result of a finished render process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl RenderOutcome {
    /// Exit code zero is the only success signal.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches the renderer for one script at a time.
#[derive(Debug, Clone, Default)]
pub struct RenderInvoker {
    config: RenderConfig,
}

impl RenderInvoker {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Full argument list after the program name.
    pub fn arguments(&self, script_file: &str, scene_class: &str) -> Vec<String> {
        let mut args = self.config.program_args.clone();
        args.extend([
            self.config.quality.flag().to_string(),
            "-o".to_string(),
            self.config.output_file.clone(),
            script_file.to_string(),
            scene_class.to_string(),
        ]);
        args
    }

    /// Render `scene_class` from `script_path`, blocking until the process exits.
    ///
    /// The process runs in the script's directory, so the renderer's media tree
    /// lands next to the script. On timeout the child is killed.
    pub async fn render(
        &self,
        script_path: &Path,
        scene_class: &str,
    ) -> Result<RenderOutcome, RenderError> {
        let start = Instant::now();

        let script_file = script_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RenderError::InvalidScriptPath(script_path.to_path_buf()))?;
        let work_dir = match script_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let args = self.arguments(script_file, scene_class);
        debug!(program = %self.config.program, args = ?args, dir = %work_dir.display(), "Launching renderer");

        let child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let waited = if self.config.timeout_secs > 0 {
            let limit = Duration::from_secs(self.config.timeout_secs);
            tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RenderError::Timeout {
                    limit_ms: limit.as_millis() as u64,
                })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|source| RenderError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        Ok(RenderOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str, timeout_secs: u64) -> RenderInvoker {
        RenderInvoker::new(RenderConfig {
            program: "sh".to_string(),
            program_args: vec!["-c".to_string(), script.to_string(), "renderer".to_string()],
            timeout_secs,
            ..RenderConfig::default()
        })
    }

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.program, "manim");
        assert_eq!(config.quality, Quality::Low);
        assert_eq!(config.output_file, "final_video.mp4");
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_fixed_invocation() {
        let invoker = RenderInvoker::default();
        assert_eq!(
            invoker.arguments("generated_scene.py", "GenScene"),
            vec!["-ql", "-o", "final_video.mp4", "generated_scene.py", "GenScene"]
        );
    }

    #[test]
    fn test_quality_presets() {
        assert_eq!(Quality::Low.output_dir(), "480p15");
        assert_eq!(Quality::High.flag(), "-qh");
        assert_eq!("4k".parse::<Quality>().unwrap(), Quality::FourK);
        assert_eq!("Medium".parse::<Quality>().unwrap(), Quality::Medium);
        assert!("ultra".parse::<Quality>().is_err());
    }

    #[tokio::test]
    async fn test_render_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("scene.py");
        std::fs::write(&script, "pass").unwrap();

        let invoker = shell("echo \"$@\"; echo warning >&2", 30);
        let outcome = invoker.render(&script, "GenScene").await.unwrap();

        assert!(outcome.succeeded());
        assert_eq!(outcome.stdout.trim(), "-ql -o final_video.mp4 scene.py GenScene");
        assert_eq!(outcome.stderr.trim(), "warning");
    }

    #[tokio::test]
    async fn test_render_runs_in_script_directory() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("scene.py");
        std::fs::write(&script, "pass").unwrap();

        let invoker = shell("touch marker", 30);
        invoker.render(&script, "GenScene").await.unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_render_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("scene.py");

        let invoker = shell("echo 'NameError: Circl' >&2; exit 3", 30);
        let outcome = invoker.render(&script, "GenScene").await.unwrap();

        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.stderr.contains("NameError"));
    }

    #[tokio::test]
    async fn test_render_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("scene.py");

        let invoker = shell("sleep 5", 1);
        let start = Instant::now();
        let err = invoker.render(&script, "GenScene").await.unwrap_err();

        assert!(matches!(err, RenderError::Timeout { limit_ms: 1000 }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_render_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = RenderInvoker::new(RenderConfig {
            program: "scenecraft-no-such-renderer".to_string(),
            ..RenderConfig::default()
        });
        let err = invoker
            .render(&dir.path().join("scene.py"), "GenScene")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }
}
