//! In-process fakes for the pipeline's external collaborators (testing only)
//!
//! Provides generators that never touch the network and a shell-script
//! renderer that follows the real renderer's output naming convention.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::generator::{GeneratorError, SceneGenerator};
use crate::render::RenderConfig;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Returns the same text for every description.
#[derive(Debug)]
pub struct StaticGenerator {
    text: String,
    calls: AtomicU32,
}

impl StaticGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SceneGenerator for StaticGenerator {
    async fn generate(&self, _description: &str) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Produces a valid scene whose script embeds the description as a comment.
#[derive(Debug, Default)]
pub struct EchoGenerator;

#[async_trait]
impl SceneGenerator for EchoGenerator {
    async fn generate(&self, description: &str) -> Result<String, GeneratorError> {
        let code = format!(
            "# {}\nclass GenScene(Scene):\n    def construct(self):\n        self.play(Create(Circle()))\n",
            description.replace('\n', " ")
        );
        Ok(serde_json::json!({
            "scene_logic": [description],
            "manim_code": code,
        })
        .to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Always fails as if the service were unreachable.
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl SceneGenerator for FailingGenerator {
    async fn generate(&self, _description: &str) -> Result<String, GeneratorError> {
        Err(GeneratorError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Behaviour of the fake renderer script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeRenderer {
    /// Writes the script text to the conventional artifact path, exits 0.
    Succeeds,
    /// Prints `stderr` to standard error and exits with `exit_code`.
    Fails { exit_code: i32, stderr: String },
    /// Exits 0 without writing anything.
    Silent,
    /// Sleeps for `secs` seconds.
    Hangs { secs: u64 },
    /// Sleeps for `secs` seconds, then behaves like `Succeeds`.
    Slow { secs: u64 },
}

const SUCCEEDS_SCRIPT: &str = r#"#!/bin/sh
# args: <quality flag> -o <output file> <script> <scene>
quality="$1"; output="$3"; script="$4"
case "$quality" in
  -ql) res=480p15 ;;
  -qm) res=720p30 ;;
  -qh) res=1080p60 ;;
  -qp) res=1440p60 ;;
  -qk) res=2160p60 ;;
  *) echo "unknown quality $quality" >&2; exit 2 ;;
esac
module=$(basename "$script" .py)
mkdir -p "media/videos/$module/$res"
cat "$script" > "media/videos/$module/$res/$output"
echo "File ready at media/videos/$module/$res/$output"
"#;

impl FakeRenderer {
    /// Write the fake renderer into `dir` and return a config that runs it.
    pub fn install(&self, dir: &Path) -> io::Result<RenderConfig> {
        std::fs::create_dir_all(dir)?;
        let script_path = dir.join("fake_renderer.sh");

        let body = match self {
            FakeRenderer::Succeeds => SUCCEEDS_SCRIPT.to_string(),
            FakeRenderer::Fails { exit_code, stderr } => {
                let stderr_path = dir.join("fake_renderer.stderr");
                std::fs::write(&stderr_path, stderr)?;
                format!(
                    "#!/bin/sh\ncat '{}' >&2\nexit {}\n",
                    stderr_path.display(),
                    exit_code
                )
            }
            FakeRenderer::Silent => "#!/bin/sh\nexit 0\n".to_string(),
            FakeRenderer::Hangs { secs } => format!("#!/bin/sh\nsleep {}\n", secs),
            FakeRenderer::Slow { secs } => {
                SUCCEEDS_SCRIPT.replacen("#!/bin/sh\n", &format!("#!/bin/sh\nsleep {}\n", secs), 1)
            }
        };
        std::fs::write(&script_path, body)?;

        Ok(RenderConfig {
            program: "sh".to_string(),
            program_args: vec![script_path.to_string_lossy().into_owned()],
            ..RenderConfig::default()
        })
    }
}
