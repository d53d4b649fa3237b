//! `POST /recheck?program_id=`: re-ingest a program from its stored URL.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use scholarmap_core::{
  extract::Extractor,
  fetch::PageFetcher,
  store::ProgramStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::Authenticated,
  error::Error,
  handlers::ingest::{IngestResponse, parse_program_id},
};

#[derive(Debug, Deserialize)]
pub struct RecheckParams {
  pub program_id: String,
}

pub async fn handler<F, E, S>(
  _auth: Authenticated,
  State(state): State<AppState<F, E, S>>,
  params: Result<Query<RecheckParams>, QueryRejection>,
) -> Result<Json<IngestResponse>, Error>
where
  F: PageFetcher + 'static,
  E: Extractor + 'static,
  S: ProgramStore + 'static,
{
  let Query(params) = params.map_err(|e| Error::BadRequest(e.body_text()))?;
  let program_id = parse_program_id(params.program_id.trim())?;
  let outcome = state.pipeline.recheck(program_id).await?;
  Ok(Json(outcome.into()))
}
