//! [`GeminiExtractor`]: the Gemini `generateContent` backed [`Extractor`].

use reqwest::StatusCode;
use scholarmap_core::{
  extract::Extractor,
  extraction::{ExtractionResult, build_prompt, truncate_chars},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str =
  "https://generativelanguage.googleapis.com/v1beta";

/// How much of an error body is kept in [`GeminiError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum GeminiError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("model API returned {status}: {body}")]
  Status { status: StatusCode, body: String },
  #[error("model returned no text")]
  EmptyResponse,
  #[error(transparent)]
  Extraction(#[from] scholarmap_core::Error),
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  contents:          [Content<'a>; 1],
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
  role:  &'static str,
  parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

impl GenerateResponse {
  /// Concatenated text parts of the first candidate.
  fn text(self) -> Option<String> {
    let parts = self.candidates.into_iter().next()?.content?.parts;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    (!text.trim().is_empty()).then_some(text)
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GeminiExtractor {
  client:   reqwest::Client,
  api_key:  String,
  model:    String,
  base_url: String,
}

impl GeminiExtractor {
  pub fn new(api_key: impl Into<String>) -> Result<Self, GeminiError> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(GeminiError::Client)?;
    Ok(Self {
      client,
      api_key: api_key.into(),
      model: DEFAULT_MODEL.to_string(),
      base_url: DEFAULT_BASE_URL.to_string(),
    })
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
    let url = format!(
      "{}/models/{}:generateContent",
      self.base_url.trim_end_matches('/'),
      self.model
    );
    let body = GenerateRequest {
      contents:          [Content { role: "user", parts: [Part { text: prompt }] }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json",
      },
    };

    debug!(model = %self.model, prompt_chars = prompt.len(), "calling model");
    let resp = self
      .client
      .post(url)
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let raw = resp.text().await.unwrap_or_default();
      return Err(GeminiError::Status {
        status,
        body: truncate_chars(&raw, MAX_ERROR_BODY_CHARS).to_string(),
      });
    }

    resp
      .json::<GenerateResponse>()
      .await?
      .text()
      .ok_or(GeminiError::EmptyResponse)
  }
}

/// Drop a surrounding ```` ```json ```` fence, which some models add even in
/// JSON mode.
fn strip_code_fence(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(inner) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let inner = inner.strip_prefix("json").unwrap_or(inner);
  inner.strip_suffix("```").unwrap_or(inner).trim()
}

impl Extractor for GeminiExtractor {
  type Error = GeminiError;

  fn model(&self) -> &str { &self.model }

  async fn extract(&self, page_text: &str) -> Result<ExtractionResult, GeminiError> {
    let answer = self.generate(&build_prompt(page_text)).await?;
    Ok(ExtractionResult::parse(strip_code_fence(&answer))?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    Json, Router,
    extract::Path,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
  };
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  /// Serve a fake `generateContent` endpoint that answers with `reply` when
  /// called with key `test-key` in JSON mode.
  async fn fake_gemini(reply: Value) -> String {
    let app = Router::new().route(
      "/v1beta/models/{call}",
      post(
        move |Path(call): Path<String>, headers: HeaderMap, Json(req): Json<Value>| {
          let reply = reply.clone();
          async move {
            if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok())
              != Some("test-key")
            {
              return (StatusCode::FORBIDDEN, "bad key").into_response();
            }
            if call != "gemini-2.0-flash:generateContent"
              || req["generationConfig"]["responseMimeType"] != "application/json"
            {
              return StatusCode::BAD_REQUEST.into_response();
            }
            Json(reply).into_response()
          }
        },
      ),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/v1beta")
  }

  fn answer(text: &str) -> Value {
    json!({
      "candidates": [{
        "content": { "role": "model", "parts": [{ "text": text }] }
      }]
    })
  }

  fn extractor(base: &str, key: &str) -> GeminiExtractor {
    GeminiExtractor::new(key).unwrap().with_base_url(base)
  }

  #[tokio::test]
  async fn extracts_json_answer() {
    let base = fake_gemini(answer(
      r#"{"name": "X Fellowship", "level": "phd", "confidence_score": 0.8}"#,
    ))
    .await;

    let result = extractor(&base, "test-key").extract("page").await.unwrap();
    assert_eq!(result.name.as_deref(), Some("X Fellowship"));
    assert_eq!(result.confidence(), 0.8);
  }

  #[tokio::test]
  async fn fenced_answer_is_accepted() {
    let base = fake_gemini(answer("```json\n{\"name\": \"Fenced\"}\n```")).await;
    let result = extractor(&base, "test-key").extract("page").await.unwrap();
    assert_eq!(result.name.as_deref(), Some("Fenced"));
  }

  #[tokio::test]
  async fn non_json_answer_is_an_extraction_error() {
    let base = fake_gemini(answer("I could not find a program here.")).await;
    let err = extractor(&base, "test-key").extract("page").await.unwrap_err();
    assert!(matches!(
      err,
      GeminiError::Extraction(scholarmap_core::Error::InvalidJson(_))
    ));
  }

  #[tokio::test]
  async fn array_answer_is_rejected() {
    let base = fake_gemini(answer("[1, 2]")).await;
    let err = extractor(&base, "test-key").extract("page").await.unwrap_err();
    assert!(matches!(
      err,
      GeminiError::Extraction(scholarmap_core::Error::NotAnObject(_))
    ));
  }

  #[tokio::test]
  async fn no_candidates_is_empty_response() {
    let base = fake_gemini(json!({ "candidates": [] })).await;
    let err = extractor(&base, "test-key").extract("page").await.unwrap_err();
    assert!(matches!(err, GeminiError::EmptyResponse));
  }

  #[tokio::test]
  async fn api_error_status_is_reported() {
    let base = fake_gemini(answer("{}")).await;
    let err = extractor(&base, "wrong-key").extract("page").await.unwrap_err();
    match err {
      GeminiError::Status { status, body } => {
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "bad key");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn strip_code_fence_variants() {
    assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
    assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
  }
}
