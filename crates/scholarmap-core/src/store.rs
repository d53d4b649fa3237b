//! The `ProgramStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `scholarmap-store-sqlite`). The pipeline and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::program::{FundingType, Level, NewIngestion, Program, ProgramView};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ProgramStore::list_programs`].
#[derive(Debug, Clone, Default)]
pub struct ProgramQuery {
  /// Case-insensitive substring match over name and provider.
  pub text:         Option<String>,
  pub level:        Option<Level>,
  pub funding_type: Option<FundingType>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store programs are written to.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ProgramStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Write everything one ingestion produced and return the program id.
  ///
  /// With `existing = None` a new program is created. With `Some(id)` the
  /// program row is overwritten and its rules, requirements and deadlines are
  /// replaced by the new set; source and review rows are appended. The whole
  /// write is atomic: on error nothing is persisted.
  fn persist(
    &self,
    ingestion: NewIngestion,
    existing: Option<Uuid>,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Retrieve a program row by id. Returns `None` if not found.
  fn get_program(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Program>, Self::Error>> + Send + '_;

  /// Assemble a [`ProgramView`]. Returns `None` if the program does not exist.
  fn materialize(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ProgramView>, Self::Error>> + Send + '_;

  /// List programs matching `query`, most recently verified first.
  fn list_programs<'a>(
    &'a self,
    query: &'a ProgramQuery,
  ) -> impl Future<Output = Result<Vec<Program>, Self::Error>> + Send + 'a;
}
