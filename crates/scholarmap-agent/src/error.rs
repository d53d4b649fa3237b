//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use scholarmap_core::{BoxError, IngestError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("not found: {0}")]
  NotFound(String),
  #[error(transparent)]
  Ingest(#[from] IngestError),
  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Status code and machine-readable kind for the response body.
  fn classify(&self) -> (StatusCode, &'static str) {
    match self {
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
      Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
      Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
      Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
      Error::Ingest(e) => match e {
        IngestError::ProgramNotFound(_) => {
          (StatusCode::NOT_FOUND, "program_not_found")
        }
        IngestError::InvalidStoredUrl { .. } => {
          (StatusCode::INTERNAL_SERVER_ERROR, "invalid_stored_url")
        }
        IngestError::Fetch(_) => (StatusCode::BAD_REQUEST, "fetch_failed"),
        IngestError::Extraction(_) => {
          (StatusCode::INTERNAL_SERVER_ERROR, "extraction_failed")
        }
        IngestError::Persistence(_) => {
          (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed")
        }
      },
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, kind) = self.classify();
    if status.is_server_error() {
      tracing::error!(kind, error = %self, "request failed");
    }

    let mut res =
      (status, Json(json!({ "error": kind, "detail": self.to_string() })))
        .into_response();
    if let Error::Unauthorized = self {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer"),
      );
    }
    res
  }
}
