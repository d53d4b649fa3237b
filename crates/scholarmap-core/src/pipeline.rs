//! [`IngestPipeline`]: fetch, extract, persist.
//!
//! The pipeline owns its three collaborators; nothing is read from ambient
//! globals, so tests substitute deterministic fakes for each of them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
  IngestError,
  extract::Extractor,
  extraction::{MAX_PAGE_CHARS, truncate_chars},
  fetch::PageFetcher,
  store::ProgramStore,
};

/// One ingestion to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
  pub url:        Url,
  /// Refresh this program instead of creating a new one.
  pub program_id: Option<Uuid>,
}

/// What a successful ingestion reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
  pub program_id: Uuid,
  pub confidence: f64,
  pub issues:     Vec<String>,
}

pub struct IngestPipeline<F, E, S> {
  fetcher:   F,
  extractor: E,
  store:     S,
}

impl<F, E, S> IngestPipeline<F, E, S>
where
  F: PageFetcher,
  E: Extractor,
  S: ProgramStore,
{
  pub fn new(fetcher: F, extractor: E, store: S) -> Self {
    Self { fetcher, extractor, store }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Fetch `request.url`, extract it and persist the result.
  ///
  /// An unknown `program_id` is rejected before any network call.
  pub async fn ingest(
    &self,
    request: IngestRequest,
  ) -> Result<IngestOutcome, IngestError> {
    let IngestRequest { url, program_id } = request;
    info!(%url, ?program_id, "ingestion started");

    if let Some(id) = program_id {
      self.require_program(id).await?;
    }

    let page = self.fetcher.fetch(&url).await.map_err(|e| {
      warn!(%url, error = %e, "page fetch failed");
      IngestError::Fetch(Box::new(e))
    })?;
    let text = truncate_chars(&page.text, MAX_PAGE_CHARS);

    let extraction = self.extractor.extract(text).await.map_err(|e| {
      warn!(%url, model = self.extractor.model(), error = %e, "extraction failed");
      IngestError::Extraction(Box::new(e))
    })?;

    let ingestion =
      extraction.into_ingestion(&url, self.extractor.model(), Utc::now());
    let confidence = ingestion.confidence();
    let issues = ingestion.issues();

    let program_id = self
      .store
      .persist(ingestion, program_id)
      .await
      .map_err(|e| {
        warn!(%url, ?program_id, error = %e, "persisting extraction failed");
        IngestError::Persistence(Box::new(e))
      })?;

    info!(
      %url,
      %program_id,
      confidence,
      issues = issues.len(),
      "ingestion finished"
    );

    Ok(IngestOutcome { program_id, confidence, issues })
  }

  /// Re-run ingestion for a stored program against its official URL.
  pub async fn recheck(&self, program_id: Uuid) -> Result<IngestOutcome, IngestError> {
    let program = self.require_program(program_id).await?;

    let url = Url::parse(&program.official_url).map_err(|_| {
      IngestError::InvalidStoredUrl {
        program_id,
        url: program.official_url.clone(),
      }
    })?;

    self
      .ingest(IngestRequest { url, program_id: Some(program_id) })
      .await
  }

  async fn require_program(
    &self,
    id: Uuid,
  ) -> Result<crate::program::Program, IngestError> {
    self
      .store
      .get_program(id)
      .await
      .map_err(|e| IngestError::Persistence(Box::new(e)))?
      .ok_or(IngestError::ProgramNotFound(id))
  }
}
