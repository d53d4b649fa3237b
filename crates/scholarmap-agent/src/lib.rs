//! HTTP surface of the ScholarMap ingestion agent.
//!
//! Exposes an axum [`Router`] that turns scholarship pages into structured
//! program records through an [`IngestPipeline`], backed by any
//! [`PageFetcher`], [`Extractor`] and [`ProgramStore`].

pub mod auth;
pub mod error;
pub mod fetch;
pub mod gemini;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use scholarmap_core::{
  extract::Extractor,
  fetch::PageFetcher,
  pipeline::IngestPipeline,
  store::ProgramStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use handlers::{health, ingest, programs, recheck};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SCHOLARMAP_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Shared secret expected in `Authorization: Bearer <secret>`.
  pub agent_secret:       String,
  pub gemini_api_key:     String,
  #[serde(default = "default_gemini_model")]
  pub gemini_model:       String,
  #[serde(default = "default_gemini_base_url")]
  pub gemini_base_url:    String,
  #[serde(default = "default_fetch_timeout_secs")]
  pub fetch_timeout_secs: u64,
  #[serde(default = "default_user_agent")]
  pub user_agent:         String,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_gemini_model() -> String { gemini::DEFAULT_MODEL.to_string() }
fn default_gemini_base_url() -> String { gemini::DEFAULT_BASE_URL.to_string() }
fn default_fetch_timeout_secs() -> u64 { fetch::DEFAULT_TIMEOUT.as_secs() }
fn default_user_agent() -> String { fetch::DEFAULT_USER_AGENT.to_string() }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<F, E, S> {
  pub pipeline: Arc<IngestPipeline<F, E, S>>,
  pub auth:     Arc<AuthConfig>,
}

impl<F, E, S> AppState<F, E, S> {
  pub fn new(pipeline: IngestPipeline<F, E, S>, secret: &str) -> Self {
    Self {
      pipeline: Arc::new(pipeline),
      auth:     Arc::new(AuthConfig::new(secret)),
    }
  }
}

impl<F, E, S> Clone for AppState<F, E, S> {
  fn clone(&self) -> Self {
    Self { pipeline: self.pipeline.clone(), auth: self.auth.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the agent's axum [`Router`].
pub fn router<F, E, S>(state: AppState<F, E, S>) -> Router
where
  F: PageFetcher + 'static,
  E: Extractor + 'static,
  S: ProgramStore + 'static,
{
  Router::new()
    .route("/health",        get(health::handler))
    .route("/ingest",        post(ingest::handler::<F, E, S>))
    .route("/recheck",       post(recheck::handler::<F, E, S>))
    .route("/programs",      get(programs::list::<F, E, S>))
    .route("/programs/{id}", get(programs::get_one::<F, E, S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use scholarmap_core::{
    extraction::{ExtractionResult, LOW_CONFIDENCE_ISSUE},
    fetch::FetchedPage,
    program::{Program, ProgramView},
  };
  use scholarmap_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use url::Url;
  use uuid::Uuid;

  use crate::handlers::ingest::IngestResponse;

  const SECRET: &str = "test-secret";

  #[derive(Debug, thiserror::Error)]
  #[error("{0}")]
  struct FakeError(String);

  /// Serves canned pages by URL; anything else is a 404.
  struct FakeFetcher {
    pages: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
  }

  impl PageFetcher for FakeFetcher {
    type Error = FakeError;

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FakeError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let text = self
        .pages
        .get(url.as_str())
        .ok_or_else(|| FakeError("HTTP 404 Not Found".into()))?;
      Ok(FetchedPage { url: url.clone(), status: 200, text: text.clone() })
    }
  }

  /// Answers with the JSON registered for the page text.
  struct FakeExtractor {
    answers: HashMap<String, Value>,
  }

  impl Extractor for FakeExtractor {
    type Error = FakeError;

    fn model(&self) -> &str { "gemini-2.0-flash" }

    async fn extract(&self, page_text: &str) -> Result<ExtractionResult, FakeError> {
      let answer = self
        .answers
        .get(page_text)
        .ok_or_else(|| FakeError("model output is not valid JSON".into()))?;
      ExtractionResult::from_value(answer.clone())
        .map_err(|e| FakeError(e.to_string()))
    }
  }

  type TestState = AppState<FakeFetcher, FakeExtractor, SqliteStore>;

  const FELLOWSHIP_URL: &str = "https://example.org/fellowship";
  const REVISED_URL: &str = "https://example.org/fellowship-2026";
  const BROKEN_URL: &str = "https://example.org/garbled";
  const MISSING_URL: &str = "https://example.org/missing";

  async fn make_state() -> (TestState, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = FakeFetcher {
      pages: HashMap::from([
        (FELLOWSHIP_URL.to_string(), "fellowship page".to_string()),
        (REVISED_URL.to_string(), "revised page".to_string()),
        (BROKEN_URL.to_string(), "garbled page".to_string()),
      ]),
      calls: calls.clone(),
    };
    let extractor = FakeExtractor {
      answers: HashMap::from([
        (
          "fellowship page".to_string(),
          json!({
            "name": "X Fellowship",
            "provider": "Y Foundation",
            "confidence_score": 0.3,
            "eligibility_rules": [
              {"rule_type": "gpa", "operator": ">=", "value": {"min": 3.0}},
              {"rule_type": "age", "operator": "<=", "value": {"max": 30}}
            ],
            "requirements": [{"type": "cv", "description": "CV"}],
            "deadlines": [{"deadline_date": "2025-12-01"}]
          }),
        ),
        (
          "revised page".to_string(),
          json!({
            "name": "X Fellowship 2026",
            "confidence_score": 0.9,
            "eligibility_rules": [{"rule_type": "degree"}]
          }),
        ),
      ]),
    };
    let store = SqliteStore::open_in_memory().await.unwrap();
    let pipeline = IngestPipeline::new(fetcher, extractor, store);
    (AppState::new(pipeline, SECRET), calls)
  }

  async fn send(
    state:  TestState,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = auth {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    router(state).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body<T: serde::de::DeserializeOwned>(resp: Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn ingest(state: &TestState, body: Value) -> Response {
    send(state.clone(), "POST", "/ingest", Some(SECRET), Some(body)).await
  }

  async fn view(state: &TestState, id: Uuid) -> ProgramView {
    state.pipeline.store().materialize(id).await.unwrap().unwrap()
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_auth() {
    let (state, _) = make_state().await;
    let resp = send(state, "GET", "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = json_body(resp).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ingest_without_token_is_rejected_before_fetching() {
    let (state, calls) = make_state().await;
    let body = json!({"url": FELLOWSHIP_URL});

    let resp = send(state.clone(), "POST", "/ingest", None, Some(body.clone())).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(state.clone(), "POST", "/ingest", Some("wrong"), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: Value = json_body(resp).await;
    assert_eq!(err["error"], "unauthorized");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let all = state.pipeline.store().list_programs(&Default::default()).await.unwrap();
    assert!(all.is_empty());
  }

  #[tokio::test]
  async fn recheck_and_reads_require_auth() {
    let (state, _) = make_state().await;
    let id = Uuid::new_v4();
    for (method, uri) in [
      ("POST", format!("/recheck?program_id={id}")),
      ("GET", "/programs".to_string()),
      ("GET", format!("/programs/{id}")),
    ] {
      let resp = send(state.clone(), method, &uri, None, None).await;
      assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
  }

  // ── Ingest ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ingest_creates_program_with_low_confidence_warning() {
    let (state, _) = make_state().await;
    let resp = ingest(&state, json!({"url": FELLOWSHIP_URL})).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let out: IngestResponse = json_body(resp).await;
    assert!(out.success);
    assert_eq!(out.confidence, 0.3);
    assert_eq!(out.issues, vec![LOW_CONFIDENCE_ISSUE.to_string()]);

    let view = view(&state, out.program_id.unwrap()).await;
    assert_eq!(view.program.name, "X Fellowship");
    assert_eq!(view.program.provider, "Y Foundation");
    assert_eq!(view.program.official_url, FELLOWSHIP_URL);
    assert_eq!(view.eligibility_rules.len(), 2);
    assert_eq!(view.requirements.len(), 1);
    assert_eq!(view.deadlines.len(), 1);
    assert_eq!(view.sources.len(), 1);
    assert_eq!(view.reviews.len(), 1);
  }

  #[tokio::test]
  async fn ingest_with_program_id_replaces_children() {
    let (state, _) = make_state().await;
    let first: IngestResponse =
      json_body(ingest(&state, json!({"url": FELLOWSHIP_URL})).await).await;
    let id = first.program_id.unwrap();

    let resp = ingest(
      &state,
      json!({"url": REVISED_URL, "program_id": id.to_string()}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: IngestResponse = json_body(resp).await;
    assert_eq!(second.program_id, Some(id));
    assert!(second.issues.is_empty());

    let view = view(&state, id).await;
    assert_eq!(view.program.name, "X Fellowship 2026");
    assert_eq!(view.program.official_url, REVISED_URL);
    assert_eq!(view.eligibility_rules.len(), 1);
    assert!(view.requirements.is_empty());
    assert!(view.deadlines.is_empty());
    assert_eq!(view.sources.len(), 2);
  }

  #[tokio::test]
  async fn fetch_failure_is_bad_request_and_writes_nothing() {
    let (state, _) = make_state().await;
    let resp = ingest(&state, json!({"url": MISSING_URL})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = json_body(resp).await;
    assert_eq!(err["error"], "fetch_failed");
    assert!(err["detail"].as_str().unwrap().contains("404"));

    let all = state.pipeline.store().list_programs(&Default::default()).await.unwrap();
    assert!(all.is_empty());
  }

  #[tokio::test]
  async fn unparseable_model_output_is_server_error() {
    let (state, _) = make_state().await;
    let resp = ingest(&state, json!({"url": BROKEN_URL})).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err: Value = json_body(resp).await;
    assert_eq!(err["error"], "extraction_failed");
  }

  #[tokio::test]
  async fn malformed_bodies_are_bad_requests() {
    let (state, calls) = make_state().await;
    for body in [
      json!({}),
      json!({"url": 42}),
      json!({"url": "ftp://example.org/file"}),
      json!({"url": FELLOWSHIP_URL, "program_id": "not-a-uuid"}),
    ] {
      let resp = ingest(&state, body.clone()).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn ingest_for_unknown_program_is_not_found() {
    let (state, calls) = make_state().await;
    let resp = ingest(
      &state,
      json!({"url": FELLOWSHIP_URL, "program_id": Uuid::new_v4().to_string()}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  // ── Recheck ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recheck_reingests_from_stored_url() {
    let (state, calls) = make_state().await;
    let first: IngestResponse =
      json_body(ingest(&state, json!({"url": FELLOWSHIP_URL})).await).await;
    let id = first.program_id.unwrap();

    let uri = format!("/recheck?program_id={id}");
    let resp = send(state.clone(), "POST", &uri, Some(SECRET), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let out: IngestResponse = json_body(resp).await;
    assert_eq!(out.program_id, Some(id));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let view = view(&state, id).await;
    assert_eq!(view.eligibility_rules.len(), 2);
    assert_eq!(view.sources.len(), 2);
    assert_eq!(view.reviews.len(), 2);
  }

  #[tokio::test]
  async fn recheck_unknown_program_is_not_found() {
    let (state, calls) = make_state().await;
    let uri = format!("/recheck?program_id={}", Uuid::new_v4());
    let resp = send(state, "POST", &uri, Some(SECRET), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn recheck_without_valid_id_is_bad_request() {
    let (state, _) = make_state().await;
    for uri in ["/recheck", "/recheck?program_id=abc"] {
      let resp = send(state.clone(), "POST", uri, Some(SECRET), None).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
  }

  // ── Reads ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn program_reads() {
    let (state, _) = make_state().await;
    let first: IngestResponse =
      json_body(ingest(&state, json!({"url": FELLOWSHIP_URL})).await).await;
    let id = first.program_id.unwrap();

    let resp = send(state.clone(), "GET", &format!("/programs/{id}"), Some(SECRET), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view: ProgramView = json_body(resp).await;
    assert_eq!(view.program.program_id, id);
    assert_eq!(view.eligibility_rules.len(), 2);

    let resp = send(state.clone(), "GET", "/programs?q=fellowship", Some(SECRET), None).await;
    let list: Vec<Program> = json_body(resp).await;
    assert_eq!(list.len(), 1);

    let resp = send(state.clone(), "GET", "/programs?level=phd", Some(SECRET), None).await;
    let list: Vec<Program> = json_body(resp).await;
    assert!(list.is_empty());

    let missing = format!("/programs/{}", Uuid::new_v4());
    let resp = send(state, "GET", &missing, Some(SECRET), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
