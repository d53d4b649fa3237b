//! Error types for `scholarmap-core`.

use thiserror::Error;
use uuid::Uuid;

/// A boxed collaborator error (fetcher, extractor or store).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to interpret model output as an extraction.
#[derive(Debug, Error)]
pub enum Error {
  #[error("model output is not valid JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),

  #[error("model output must be a JSON object, got {0}")]
  NotAnObject(&'static str),
}

/// Failure of one ingestion, classified by the step that failed.
#[derive(Debug, Error)]
pub enum IngestError {
  #[error("program not found: {0}")]
  ProgramNotFound(Uuid),

  #[error("program {program_id} has an invalid official url: {url:?}")]
  InvalidStoredUrl { program_id: Uuid, url: String },

  #[error("failed to fetch URL: {0}")]
  Fetch(#[source] BoxError),

  #[error("extraction failed: {0}")]
  Extraction(#[source] BoxError),

  #[error("persistence failed: {0}")]
  Persistence(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
