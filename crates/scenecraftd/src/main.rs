use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scenecraft_core::{
    AnimationPipeline, GeminiGenerator, PipelineLimits, Quality, RenderConfig, RenderInvoker,
    RetentionPolicy, SceneGenerator, Workspace, METRICS,
};
use scenecraftd::{router, AppState};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "scenecraftd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Text-to-animation HTTP service", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SCENECRAFT_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Root directory for per-job working areas
    #[arg(long, env = "SCENECRAFT_WORK_DIR", default_value = "scenecraft-jobs")]
    work_dir: PathBuf,

    /// Base URL used when building video links (defaults to http://<listen>)
    #[arg(long, env = "SCENECRAFT_PUBLIC_URL")]
    public_url: Option<String>,

    /// Renderer executable
    #[arg(long, env = "SCENECRAFT_RENDERER", default_value = "manim")]
    renderer: String,

    /// Quality preset: low, medium, high, production, 4k
    #[arg(long, env = "SCENECRAFT_QUALITY", default_value = "low")]
    quality: Quality,

    /// Render wall-clock limit in seconds (0 disables)
    #[arg(long, env = "SCENECRAFT_RENDER_TIMEOUT_SECS", default_value_t = 300)]
    render_timeout_secs: u64,

    /// Renders allowed to run at the same time
    #[arg(long, env = "SCENECRAFT_MAX_CONCURRENT_RENDERS", default_value_t = 2)]
    max_concurrent_renders: usize,

    /// Seconds between working-area garbage collection passes (0 disables)
    #[arg(long, env = "SCENECRAFT_GC_INTERVAL_SECS", default_value_t = 3600)]
    gc_interval_secs: u64,

    /// Remove working areas older than this many seconds
    #[arg(long, env = "SCENECRAFT_MAX_AGE_SECS", default_value_t = 86_400)]
    max_age_secs: u64,

    /// Keep at most this many working areas
    #[arg(long, env = "SCENECRAFT_MAX_AREAS", default_value_t = 50)]
    max_areas: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env fallbacks.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    scenecraft_core::init_tracing(args.json, level);

    let generator = GeminiGenerator::from_env().context("Failed to build Gemini client")?;
    if generator.config().api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; generation requests will fail");
    }
    let generator: Arc<dyn SceneGenerator> = Arc::new(generator);

    let invoker = RenderInvoker::new(RenderConfig {
        program: args.renderer.clone(),
        quality: args.quality,
        timeout_secs: args.render_timeout_secs,
        ..RenderConfig::default()
    });
    let workspace = Workspace::open(&args.work_dir)
        .with_context(|| format!("Failed to open work dir {:?}", args.work_dir))?;
    let pipeline = Arc::new(AnimationPipeline::new(
        generator,
        invoker,
        workspace,
        PipelineLimits {
            max_concurrent_renders: args.max_concurrent_renders,
        },
    ));

    if args.gc_interval_secs > 0 {
        let policy = RetentionPolicy {
            max_age_secs: Some(args.max_age_secs),
            max_areas: Some(args.max_areas),
            ..RetentionPolicy::default()
        };
        spawn_maintenance(
            pipeline.clone(),
            policy,
            Duration::from_secs(args.gc_interval_secs),
        );
    }

    let public_url = args
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://{}", args.listen));
    let app = router(AppState::new(pipeline, public_url));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!(
        listen = %args.listen,
        work_dir = %args.work_dir.display(),
        renderer = %args.renderer,
        quality = %args.quality,
        "scenecraftd started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    METRICS.flush();
    info!("scenecraftd stopped");
    Ok(())
}

/// Periodic garbage collection and metrics flush.
fn spawn_maintenance(pipeline: Arc<AnimationPipeline>, policy: RetentionPolicy, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let pruner = pipeline.clone();
            let policy = policy.clone();
            match tokio::task::spawn_blocking(move || pruner.prune(&policy)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "working-area prune failed"),
                Err(err) => warn!(error = %err, "prune task panicked"),
            }
            METRICS.flush();
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
