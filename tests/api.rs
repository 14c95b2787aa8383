use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use postforge::api::{self, AppState};
use postforge::inference::{GenerationError, InferenceService, TextBackend, HEALTH_CHECK_PROMPT};
use postforge::prompts::PromptLibrary;

// ------------------------------------------------------------
// STUB BACKENDS
// ------------------------------------------------------------

/// Echoes the prompt back, or a fixed reply, and records every prompt it sees.
#[derive(Default)]
struct Recording {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl Recording {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    fn generation_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() != HEALTH_CHECK_PROMPT)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextBackend for Recording {
    async fn invoke(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone().unwrap_or_else(|| prompt.to_string()))
    }
}

/// Fails every call.
#[derive(Default)]
struct Broken {
    calls: AtomicUsize,
}

#[async_trait]
impl TextBackend for Broken {
    async fn invoke(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Backend("stub backend exploded".into()))
    }
}

/// Answers the health check, fails real generations.
struct AnswersHealthCheck;

#[async_trait]
impl TextBackend for AnswersHealthCheck {
    async fn invoke(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt == HEALTH_CHECK_PROMPT {
            Ok("Hello".into())
        } else {
            Err(GenerationError::Backend("out of memory".into()))
        }
    }
}

/// Answers the health check, hangs on real generations.
struct Hangs;

#[async_trait]
impl TextBackend for Hangs {
    async fn invoke(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt != HEALTH_CHECK_PROMPT {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok("Hello".into())
    }
}

// ------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------

fn state(backend: Arc<dyn TextBackend>, call_timeout: Duration) -> AppState {
    let infer = InferenceService::new(backend, call_timeout, Duration::ZERO);
    AppState {
        infer: Arc::new(infer),
        prompts: Arc::new(PromptLibrary::builtin().unwrap()),
        model: Arc::from("mistral:latest"),
    }
}

fn app_with(backend: Arc<dyn TextBackend>, call_timeout: Duration) -> Router {
    api::app(state(backend, call_timeout))
}

fn app(backend: Arc<dyn TextBackend>) -> Router {
    app_with(backend, Duration::from_secs(5))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let res = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(res).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, "application/json", body.to_string()).await
}

async fn post_raw(
    app: Router,
    uri: &str,
    content_type: &str,
    body: String,
) -> (StatusCode, Value) {
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    read(res).await
}

async fn read(res: axum::response::Response) -> (StatusCode, Value) {
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn error_text(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}

const GENERATION_ROUTES: [&str; 2] = ["/generate_post", "/regenerate_post"];

// ------------------------------------------------------------
// STATUS / HEALTH
// ------------------------------------------------------------

#[tokio::test]
async fn health_never_touches_backend() {
    let backend = Arc::new(Broken::default());
    let (status, body) = get(app(backend.clone()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn status_reports_availability_model_and_routes() {
    let (status, body) = get(app(Arc::new(Recording::default())), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "API is running");
    assert_eq!(body["ollama_available"], true);
    assert_eq!(body["model"], "mistral:latest");
    assert_eq!(
        body["endpoints"],
        json!(["/", "/health", "/generate_post", "/regenerate_post", "/modify_post"])
    );
}

#[tokio::test]
async fn status_succeeds_when_backend_is_down() {
    let (status, body) = get(app(Arc::new(Broken::default())), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ollama_available"], false);
}

// ------------------------------------------------------------
// GENERATE / REGENERATE
// ------------------------------------------------------------

#[tokio::test]
async fn generate_substitutes_context_into_prompt() {
    let backend = Arc::new(Recording::default());
    let (status, body) = post_json(
        app(backend.clone()),
        "/generate_post",
        json!({ "context": "hello" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let post = body["post"].as_str().unwrap();
    assert!(post.contains("hello"));
    assert!(post.starts_with("You are a professional LinkedIn post generator."));

    let prompts = backend.generation_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("LINKEDIN POST:"));
}

#[tokio::test]
async fn regenerate_uses_its_own_template() {
    let backend = Arc::new(Recording::default());
    let (status, body) = post_json(
        app(backend.clone()),
        "/regenerate_post",
        json!({ "context": "team offsite" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let post = body["post"].as_str().unwrap();
    assert!(post.contains("team offsite"));
    assert!(post.contains("NEW LINKEDIN POST:"));
}

#[tokio::test]
async fn output_whitespace_is_trimmed() {
    for route in GENERATION_ROUTES {
        let backend = Arc::new(Recording::replying("  Hi there  \n"));
        let (status, body) = post_json(app(backend), route, json!({ "context": "x" })).await;

        assert_eq!(status, StatusCode::OK, "{route}");
        assert_eq!(body, json!({ "post": "Hi there" }), "{route}");
    }
}

#[tokio::test]
async fn post_starting_with_error_is_still_a_success() {
    let backend = Arc::new(Recording::replying("Errors are how we learn. #growth"));
    let (status, body) =
        post_json(app(backend), "/generate_post", json!({ "context": "mistakes" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"], "Errors are how we learn. #growth");
}

#[tokio::test]
async fn missing_context_is_bad_request() {
    for route in GENERATION_ROUTES {
        let backend = Arc::new(Recording::default());
        let (status, body) =
            post_json(app(backend.clone()), route, json!({ "topic": "x" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{route}");
        assert_eq!(error_text(&body), "Missing 'context' field");
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn non_json_body_is_rejected_before_backend() {
    for route in ["/generate_post", "/regenerate_post", "/modify_post"] {
        let backend = Arc::new(Recording::default());

        let (status, body) =
            post_raw(app(backend.clone()), route, "text/plain", "context=hello".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{route}");
        assert_eq!(error_text(&body), "Request must be JSON");

        let (status, _) =
            post_raw(app(backend.clone()), route, "application/json", "{not json".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{route}");

        assert!(backend.prompts.lock().unwrap().is_empty(), "{route}");
    }
}

#[tokio::test]
async fn context_larger_than_two_megabytes_is_accepted() {
    let context = "a".repeat(3 * 1024 * 1024);
    let backend = Arc::new(Recording::default());
    let (status, body) = post_json(
        app(backend.clone()),
        "/generate_post",
        json!({ "context": context }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["post"].as_str().unwrap().contains(&context));
    assert_eq!(backend.generation_prompts().len(), 1);
}

#[tokio::test]
async fn oversized_body_reports_its_own_reason() {
    let backend = Arc::new(Recording::default());
    let app = api::router()
        .layer(DefaultBodyLimit::max(16))
        .with_state(state(backend.clone(), Duration::from_secs(5)));

    let (status, body) = post_json(
        app,
        "/generate_post",
        json!({ "context": "well past sixteen bytes" }),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_ne!(error_text(&body), "Request must be JSON");
    assert!(!error_text(&body).is_empty());
    assert!(backend.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_backend_blocks_generation() {
    for route in GENERATION_ROUTES {
        let backend = Arc::new(Broken::default());
        let (status, body) =
            post_json(app(backend.clone()), route, json!({ "context": "x" })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{route}");
        assert!(error_text(&body).starts_with("Ollama service is not available"));
        // Only the health check ran.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1, "{route}");
    }
}

#[tokio::test]
async fn failing_backend_message_reaches_the_caller() {
    let modify = json!({ "context": "c", "current_post": "p", "action": "reduce" });
    let cases = [
        ("/generate_post", json!({ "context": "x" })),
        ("/regenerate_post", json!({ "context": "x" })),
        ("/modify_post", modify),
    ];

    for (route, body) in cases {
        let (status, resp) = post_json(app(Arc::new(Broken::default())), route, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{route}");
        assert!(error_text(&resp).contains("stub backend exploded"), "{route}");
    }
}

#[tokio::test]
async fn generation_failure_after_health_check_is_reported() {
    let (status, body) = post_json(
        app(Arc::new(AnswersHealthCheck)),
        "/regenerate_post",
        json!({ "context": "x" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_text(&body),
        "Error regenerating LinkedIn post: out of memory"
    );
}

#[tokio::test]
async fn slow_generation_times_out() {
    let app = app_with(Arc::new(Hangs), Duration::from_millis(100));
    let (status, body) = post_json(app, "/generate_post", json!({ "context": "x" })).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(error_text(&body).starts_with("Error generating LinkedIn post"));
}

// ------------------------------------------------------------
// MODIFY
// ------------------------------------------------------------

#[tokio::test]
async fn modify_lists_all_missing_fields() {
    let backend = Arc::new(Recording::default());
    let (status, body) =
        post_json(app(backend.clone()), "/modify_post", json!({ "action": "reduce" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_text(&body), "Missing fields: context, current_post");
    assert!(backend.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn modify_rejects_unknown_action_without_backend() {
    let backend = Arc::new(Broken::default());
    let (status, body) = post_json(
        app(backend.clone()),
        "/modify_post",
        json!({ "context": "c", "current_post": "p", "action": "translate" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_text(&body),
        "Invalid action. Use 'reduce' or 'elaborate'."
    );
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn modify_selects_template_by_action() {
    let backend = Arc::new(Recording::default());
    let app = app(backend.clone());

    let (status, body) = post_json(
        app.clone(),
        "/modify_post",
        json!({ "context": "hiring", "current_post": "We are hiring!", "action": "reduce" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reduced = body["post"].as_str().unwrap();
    assert!(reduced.contains("ORIGINAL POST:\nWe are hiring!"));
    assert!(reduced.ends_with("SHORTER LINKEDIN POST:"));
    assert!(reduced.contains("hiring"));

    let (status, body) = post_json(
        app,
        "/modify_post",
        json!({ "context": "hiring", "current_post": "We are hiring!", "action": "elaborate" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["post"]
        .as_str()
        .unwrap()
        .ends_with("EXPANDED LINKEDIN POST:"));

    assert_eq!(backend.generation_prompts().len(), 2);
}
