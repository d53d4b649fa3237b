//! `POST /ingest`: fetch, extract and persist one program page.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use scholarmap_core::{
  extract::Extractor,
  fetch::PageFetcher,
  pipeline::{IngestOutcome, IngestRequest},
  store::ProgramStore,
};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::Error};

#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub url:        String,
  /// Refresh this program instead of creating a new one. An empty string is
  /// treated as absent.
  #[serde(default)]
  pub program_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IngestResponse {
  pub success:    bool,
  pub program_id: Option<Uuid>,
  pub confidence: f64,
  pub issues:     Vec<String>,
}

impl From<IngestOutcome> for IngestResponse {
  fn from(o: IngestOutcome) -> Self {
    Self {
      success:    true,
      program_id: Some(o.program_id),
      confidence: o.confidence,
      issues:     o.issues,
    }
  }
}

impl IngestBody {
  fn into_request(self) -> Result<IngestRequest, Error> {
    let url = Url::parse(self.url.trim())
      .map_err(|e| Error::BadRequest(format!("invalid url {:?}: {e}", self.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(Error::BadRequest(format!(
        "unsupported url scheme {:?}",
        url.scheme()
      )));
    }

    let program_id = match self.program_id.as_deref().map(str::trim) {
      None | Some("") => None,
      Some(raw) => Some(parse_program_id(raw)?),
    };

    Ok(IngestRequest { url, program_id })
  }
}

pub(crate) fn parse_program_id(raw: &str) -> Result<Uuid, Error> {
  Uuid::parse_str(raw)
    .map_err(|_| Error::BadRequest(format!("invalid program_id {raw:?}")))
}

pub async fn handler<F, E, S>(
  _auth: Authenticated,
  State(state): State<AppState<F, E, S>>,
  body: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestResponse>, Error>
where
  F: PageFetcher + 'static,
  E: Extractor + 'static,
  S: ProgramStore + 'static,
{
  let Json(body) = body.map_err(|e| Error::BadRequest(e.body_text()))?;
  let request = body.into_request()?;
  let outcome = state.pipeline.ingest(request).await?;
  Ok(Json(outcome.into()))
}
