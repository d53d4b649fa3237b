//! Read-only program endpoints: `GET /programs` and `GET /programs/{id}`.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use scholarmap_core::{
  extract::Extractor,
  fetch::PageFetcher,
  program::{FundingType, Level, Program, ProgramView},
  store::{ProgramQuery, ProgramStore},
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::Authenticated,
  error::Error,
  handlers::ingest::parse_program_id,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:            Option<String>,
  pub level:        Option<Level>,
  pub funding_type: Option<FundingType>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// `GET /programs/{id}`: the program with all of its child rows.
pub async fn get_one<F, E, S>(
  _auth: Authenticated,
  State(state): State<AppState<F, E, S>>,
  Path(id): Path<String>,
) -> Result<Json<ProgramView>, Error>
where
  F: PageFetcher + 'static,
  E: Extractor + 'static,
  S: ProgramStore + 'static,
{
  let id = parse_program_id(&id)?;
  state
    .pipeline
    .store()
    .materialize(id)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| Error::NotFound(format!("program {id}")))
}

/// `GET /programs`: filtered list, most recently verified first.
pub async fn list<F, E, S>(
  _auth: Authenticated,
  State(state): State<AppState<F, E, S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Program>>, Error>
where
  F: PageFetcher + 'static,
  E: Extractor + 'static,
  S: ProgramStore + 'static,
{
  let Query(params) = params.map_err(|e| Error::BadRequest(e.body_text()))?;
  let query = ProgramQuery {
    text:         params.q.filter(|q| !q.trim().is_empty()),
    level:        params.level,
    funding_type: params.funding_type,
    limit:        params.limit,
    offset:       params.offset,
  };

  state
    .pipeline
    .store()
    .list_programs(&query)
    .await
    .map(Json)
    .map_err(|e| Error::Store(Box::new(e)))
}
