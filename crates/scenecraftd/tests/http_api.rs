//! HTTP API tests against a live server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use scenecraft_core::fakes::{FailingGenerator, FakeRenderer, StaticGenerator};
use scenecraft_core::{AnimationPipeline, PipelineLimits, RenderInvoker, SceneGenerator, Workspace};
use scenecraftd::{router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task;

const CIRCLE_RESPONSE: &str = r#"{"scene_logic": ["draw a circle", "fade it out"], "manim_code": "class GenScene(Scene):\n    def construct(self):\n        self.play(Create(Circle()))"}"#;

struct TestServer {
    address: SocketAddr,
    client: Client,
    _server_handle: task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    async fn new(generator: Arc<dyn SceneGenerator>, renderer: FakeRenderer) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = renderer
            .install(&dir.path().join("bin"))
            .expect("install fake renderer");
        let workspace = Workspace::open(dir.path().join("jobs")).expect("open workspace");
        let pipeline = Arc::new(AnimationPipeline::new(
            generator,
            RenderInvoker::new(config),
            workspace,
            PipelineLimits::default(),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let address = listener.local_addr().expect("Failed to get address");
        let app = router(AppState::new(pipeline, format!("http://{}/", address)));

        let server_handle = task::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        Self {
            address,
            client: Client::new(),
            _server_handle: server_handle,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    async fn generate(&self, description: &str) -> reqwest::Response {
        self.client
            .post(self.url("/generate"))
            .json(&json!({ "description": description }))
            .send()
            .await
            .expect("request")
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], scenecraft_core::VERSION);
}

#[tokio::test]
async fn test_generate_then_fetch_video() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server.generate("draw a circle").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    let job_id = body["jobId"].as_str().expect("jobId");
    assert_eq!(
        body["videoUrl"],
        format!("http://{}/video/{}", server.address, job_id)
    );
    assert_eq!(body["sceneLogic"], json!(["draw a circle", "fade it out"]));
    let code = body["generatedCode"].as_str().unwrap();
    assert!(code.contains("from manim import *"));
    assert!(code.contains("import numpy as np"));
    assert_eq!(body["scriptDigest"].as_str().unwrap().len(), 64);

    let video = server
        .client
        .get(body["videoUrl"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(video.status(), StatusCode::OK);
    assert_eq!(video.headers()["content-type"], "video/mp4");
    // The fake renderer writes the script as the video.
    assert_eq!(video.text().await.unwrap(), code);

    let latest = server.client.get(server.url("/video")).send().await.unwrap();
    assert_eq!(latest.status(), StatusCode::OK);
    assert_eq!(latest.text().await.unwrap(), code);
}

#[tokio::test]
async fn test_render_failure_body_hides_diagnostics() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Fails {
            exit_code: 1,
            stderr: "Traceback: NameError in /srv/secret/path".to_string(),
        },
    )
    .await;

    let response = server.generate("draw a circle").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text().await.unwrap();
    assert!(!text.contains("Traceback"));
    assert!(!text.contains("/srv/secret"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["kind"], "render_failed");
    assert!(body["message"].as_str().unwrap().contains("Rendering failed"));
}

#[tokio::test]
async fn test_gibberish_is_bad_gateway() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new("Sure! Here is a poem instead.")),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server.generate("draw a circle").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "generation_invalid");
    assert_eq!(body["message"], "AI returned invalid output.");
}

#[tokio::test]
async fn test_ai_unavailable() {
    let server = TestServer::new(Arc::new(FailingGenerator), FakeRenderer::Succeeds).await;

    let response = server.generate("draw a circle").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "ai_unavailable");
}

#[tokio::test]
async fn test_blank_description_is_invalid_input() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server.generate("   ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server
        .client
        .post(server.url("/generate"))
        .header("content-type", "application/json")
        .body("{\"prompt\": 1}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_video_lookups_before_any_render() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let latest = server.client.get(server.url("/video")).send().await.unwrap();
    assert_eq!(latest.status(), StatusCode::NOT_FOUND);
    let body: Value = latest.json().await.unwrap();
    assert_eq!(body["kind"], "artifact_missing");

    let unknown = server
        .client
        .get(server.url(&format!("/video/{}", scenecraft_core::JobId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = server
        .client
        .get(server.url("/video/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body: Value = malformed.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let server = TestServer::new(
        Arc::new(StaticGenerator::new(CIRCLE_RESPONSE)),
        FakeRenderer::Succeeds,
    )
    .await;

    let response = server
        .client
        .get(server.url("/health"))
        .header("origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
