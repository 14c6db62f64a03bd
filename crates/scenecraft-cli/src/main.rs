//! Scenecraft CLI
//!
//! The `scenecraft` command runs the text-to-animation pipeline locally, or
//! any one of its stages on its own.
//!
//! ## Commands
//!
//! - `generate`: Description in, rendered video out
//! - `render`: Sanitize and render an existing script
//! - `sanitize`: Print a script the way the renderer would receive it
//! - `validate`: Check a raw model response and print the extracted result
//! - `gc`: Prune old working areas

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use scenecraft_core::{
    sanitize, validate, AnimationPipeline, AnimationRequest, GeminiGenerator, GeneratorError,
    PipelineFailure, PipelineLimits, PipelineOutput, Quality, RenderConfig, RenderInvoker,
    RetentionPolicy, SceneGenerator, Workspace,
};
use tracing::Level;

const DEFAULT_WORK_DIR: &str = ".scenecraft/jobs";

#[derive(Parser)]
#[command(name = "scenecraft")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn text descriptions into Manim animations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Root directory for working areas
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Renderer executable
    #[arg(long, env = "SCENECRAFT_RENDERER", default_value = "manim")]
    renderer: String,

    /// Quality preset: low, medium, high, production, 4k
    #[arg(short, long, default_value = "low")]
    quality: Quality,

    /// Render wall-clock limit in seconds (0 disables)
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Copy the rendered video to this path
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and render an animation from a description
    Generate {
        /// What the animation should show
        description: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Sanitize an existing script and render it
    Render {
        /// Script file
        script: PathBuf,

        /// Scene class to render
        #[arg(long, default_value = "GenScene")]
        scene: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Print the sanitized form of a script
    Sanitize {
        /// Script file
        file: PathBuf,
    },

    /// Validate a raw model response and print the extracted fields as JSON
    Validate {
        /// File holding the raw response text
        file: PathBuf,
    },

    /// Remove old working areas
    Gc {
        /// Root directory for working areas
        #[arg(long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,

        /// Remove areas older than this many seconds
        #[arg(long)]
        max_age_secs: Option<u64>,

        /// Keep at most this many areas
        #[arg(long)]
        max_areas: Option<usize>,

        /// Never remove areas younger than this many seconds
        #[arg(long, default_value_t = 0)]
        min_age_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    scenecraft_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Generate {
            description,
            render,
        } => cmd_generate(&description, &render).await,
        Commands::Render {
            script,
            scene,
            render,
        } => cmd_render(&script, &scene, &render).await.map(|_| ()),
        Commands::Sanitize { file } => cmd_sanitize(&file),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Gc {
            work_dir,
            max_age_secs,
            max_areas,
            min_age_secs,
        } => cmd_gc(
            &work_dir,
            RetentionPolicy {
                max_age_secs,
                max_areas,
                min_age_secs,
            },
        ),
    }
}

fn build_pipeline(generator: Arc<dyn SceneGenerator>, args: &RenderArgs) -> Result<AnimationPipeline> {
    let invoker = RenderInvoker::new(RenderConfig {
        program: args.renderer.clone(),
        quality: args.quality,
        timeout_secs: args.timeout_secs,
        ..RenderConfig::default()
    });
    let workspace = Workspace::open(&args.work_dir)
        .with_context(|| format!("Failed to open work dir {:?}", args.work_dir))?;
    Ok(AnimationPipeline::new(
        generator,
        invoker,
        workspace,
        PipelineLimits::default(),
    ))
}

async fn cmd_generate(description: &str, args: &RenderArgs) -> Result<()> {
    let request = AnimationRequest::new(description)?;
    let generator = GeminiGenerator::from_env().context("Failed to build Gemini client")?;
    let pipeline = build_pipeline(Arc::new(generator), args)?;

    let output = pipeline.run(&request).await.map_err(describe_failure)?;

    println!("Scene logic:");
    for (i, step) in output.scene_logic.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!();
    print_output(&output, args.out.as_deref())
}

/// Generator for pipelines that only render existing scripts.
struct NoGenerator;

#[async_trait]
impl SceneGenerator for NoGenerator {
    async fn generate(&self, _description: &str) -> Result<String, GeneratorError> {
        Err(GeneratorError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "none"
    }
}

async fn cmd_render(script: &Path, scene: &str, args: &RenderArgs) -> Result<PipelineOutput> {
    let code = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {:?}", script))?;
    let pipeline = build_pipeline(Arc::new(NoGenerator), args)?;

    let output = pipeline
        .render_script(&code, scene)
        .await
        .map_err(describe_failure)?;
    print_output(&output, args.out.as_deref())?;
    Ok(output)
}

fn cmd_sanitize(file: &Path) -> Result<()> {
    let code =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    print!("{}", sanitize(&code));
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let result = validate(&raw).context("Response rejected")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_gc(work_dir: &Path, policy: RetentionPolicy) -> Result<()> {
    let workspace = Workspace::open(work_dir)
        .with_context(|| format!("Failed to open work dir {:?}", work_dir))?;
    let result = workspace.prune(&policy)?;
    println!(
        "Removed {} working area(s), {} remaining",
        result.removed_count, result.remaining_count
    );
    for id in &result.removed_ids {
        println!("  - {}", id);
    }
    Ok(())
}

fn print_output(output: &PipelineOutput, out: Option<&Path>) -> Result<()> {
    println!("Job:      {}", output.job_id);
    println!("Digest:   {}", output.script_digest);
    println!("Duration: {}ms", output.duration_ms);
    println!("Video:    {}", output.artifact_path.display());

    if let Some(dest) = out {
        std::fs::copy(&output.artifact_path, dest)
            .with_context(|| format!("Failed to copy video to {:?}", dest))?;
        println!("Copied to {}", dest.display());
    }
    Ok(())
}

/// Locally the full internal error is useful; the kind leads.
fn describe_failure(failure: PipelineFailure) -> anyhow::Error {
    let mut message = format!(
        "[{}] {} (job {}, stage {})",
        failure.error.kind().as_str(),
        failure.error.public_message(),
        failure.job_id,
        failure.stage
    );
    if let scenecraft_core::PipelineError::RenderFailed { stderr, .. } = &failure.error {
        if !stderr.trim().is_empty() {
            message.push_str("\n\nrenderer stderr:\n");
            message.push_str(stderr.trim_end());
        }
    }
    anyhow::anyhow!(message)
}
