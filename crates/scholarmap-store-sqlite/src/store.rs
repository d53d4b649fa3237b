//! [`SqliteStore`]: the SQLite implementation of [`ProgramStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use scholarmap_core::{
  program::{NewIngestion, Program, ProgramView},
  store::{ProgramQuery, ProgramStore},
};

use crate::{
  Error, Result,
  encode::{
    EncodedIngestion, PROGRAM_COLUMNS, RawDeadline, RawProgram, RawRequirement,
    RawReview, RawRule, RawSource, encode_dt, encode_ingestion, encode_uuid,
  },
  schema::SCHEMA,
};

/// Child tables replaced wholesale on every re-ingestion.
const REPLACED_TABLES: [&str; 3] = ["eligibility_rules", "requirements", "deadlines"];

// ─── Store ───────────────────────────────────────────────────────────────────

/// A program store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread, so two ingestions of the same
/// program never interleave their writes.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Insert every child, source and review row for `program_id` inside `tx`.
fn insert_children(
  tx: &rusqlite::Transaction<'_>,
  program_id: &str,
  rows: &EncodedIngestion,
  now: &str,
) -> rusqlite::Result<()> {
  for r in &rows.rules {
    tx.execute(
      "INSERT INTO eligibility_rules (
         rule_id, program_id, rule_type, operator, value_json, confidence,
         source_snippet
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        r.rule_id,
        program_id,
        r.rule_type,
        r.operator,
        r.value_json,
        r.confidence,
        r.source_snippet,
      ],
    )?;
  }

  for r in &rows.reqs {
    tx.execute(
      "INSERT INTO requirements (
         requirement_id, program_id, requirement_type, description, mandatory
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        r.requirement_id,
        program_id,
        r.requirement_type,
        r.description,
        r.mandatory,
      ],
    )?;
  }

  for d in &rows.deadlines {
    tx.execute(
      "INSERT INTO deadlines (deadline_id, program_id, cycle, deadline_date, stage)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![d.deadline_id, program_id, d.cycle, d.deadline_date, d.stage],
    )?;
  }

  let s = &rows.source;
  tx.execute(
    "INSERT INTO sources (
       source_id, program_id, url, agent_model, raw_summary, confidence_score,
       recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      s.source_id,
      program_id,
      s.url,
      s.agent_model,
      s.raw_summary,
      s.confidence_score,
      now,
    ],
  )?;

  for r in &rows.reviews {
    tx.execute(
      "INSERT INTO agent_reviews (
         review_id, program_id, issue_type, note, severity, recorded_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![r.review_id, program_id, r.issue_type, r.note, r.severity, now],
    )?;
  }

  Ok(())
}

// ─── ProgramStore impl ───────────────────────────────────────────────────────

impl ProgramStore for SqliteStore {
  type Error = Error;

  async fn persist(
    &self,
    ingestion: NewIngestion,
    existing: Option<Uuid>,
  ) -> Result<Uuid> {
    let rows       = encode_ingestion(ingestion)?;
    let program_id = existing.unwrap_or_else(Uuid::new_v4);
    let id_str     = encode_uuid(program_id);
    let now        = encode_dt(Utc::now());
    let is_update  = existing.is_some();

    let written: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let p  = &rows.program;

        if is_update {
          let changed = tx.execute(
            "UPDATE programs SET
               name = ?2, provider = ?3, level = ?4, funding_type = ?5,
               countries_eligible = ?6, countries_of_study = ?7, fields = ?8,
               official_url = ?9, description = ?10, who_wins = ?11,
               rejection_reasons = ?12, status = ?13, last_verified_at = ?14,
               updated_at = ?15
             WHERE program_id = ?1",
            rusqlite::params![
              id_str,
              p.name,
              p.provider,
              p.level,
              p.funding_type,
              p.countries_eligible,
              p.countries_of_study,
              p.fields,
              p.official_url,
              p.description,
              p.who_wins,
              p.rejection_reasons,
              p.status,
              p.last_verified_at,
              now,
            ],
          )?;

          // Dropping `tx` rolls back.
          if changed == 0 {
            return Ok(false);
          }

          for table in REPLACED_TABLES {
            tx.execute(
              &format!("DELETE FROM {table} WHERE program_id = ?1"),
              rusqlite::params![id_str],
            )?;
          }
        } else {
          tx.execute(
            "INSERT INTO programs (
               program_id, name, provider, level, funding_type,
               countries_eligible, countries_of_study, fields, official_url,
               description, who_wins, rejection_reasons, status,
               last_verified_at, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            rusqlite::params![
              id_str,
              p.name,
              p.provider,
              p.level,
              p.funding_type,
              p.countries_eligible,
              p.countries_of_study,
              p.fields,
              p.official_url,
              p.description,
              p.who_wins,
              p.rejection_reasons,
              p.status,
              p.last_verified_at,
              now,
            ],
          )?;
        }

        insert_children(&tx, &id_str, &rows, &now)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !written {
      return Err(Error::ProgramNotFound(program_id));
    }

    debug!(%program_id, is_update, "program persisted");
    Ok(program_id)
  }

  async fn get_program(&self, id: Uuid) -> Result<Option<Program>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProgram> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE program_id = ?1"),
              rusqlite::params![id_str],
              RawProgram::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProgram::into_program).transpose()
  }

  async fn materialize(&self, id: Uuid) -> Result<Option<ProgramView>> {
    let program = match self.get_program(id).await? {
      Some(p) => p,
      None    => return Ok(None),
    };

    let id_str = encode_uuid(id);

    let (rules, reqs, deadlines, sources, reviews) = self
      .conn
      .call(move |conn| {
        let rules = conn
          .prepare(
            "SELECT rule_id, program_id, rule_type, operator, value_json,
                    confidence, source_snippet
             FROM eligibility_rules WHERE program_id = ?1 ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRule {
              rule_id:        row.get(0)?,
              program_id:     row.get(1)?,
              rule_type:      row.get(2)?,
              operator:       row.get(3)?,
              value_json:     row.get(4)?,
              confidence:     row.get(5)?,
              source_snippet: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let reqs = conn
          .prepare(
            "SELECT requirement_id, program_id, requirement_type, description, mandatory
             FROM requirements WHERE program_id = ?1 ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRequirement {
              requirement_id:   row.get(0)?,
              program_id:       row.get(1)?,
              requirement_type: row.get(2)?,
              description:      row.get(3)?,
              mandatory:        row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let deadlines = conn
          .prepare(
            "SELECT deadline_id, program_id, cycle, deadline_date, stage
             FROM deadlines WHERE program_id = ?1 ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawDeadline {
              deadline_id:   row.get(0)?,
              program_id:    row.get(1)?,
              cycle:         row.get(2)?,
              deadline_date: row.get(3)?,
              stage:         row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let sources = conn
          .prepare(
            "SELECT source_id, program_id, url, agent_model, raw_summary,
                    confidence_score, recorded_at
             FROM sources WHERE program_id = ?1 ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawSource {
              source_id:        row.get(0)?,
              program_id:       row.get(1)?,
              url:              row.get(2)?,
              agent_model:      row.get(3)?,
              raw_summary:      row.get(4)?,
              confidence_score: row.get(5)?,
              recorded_at:      row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let reviews = conn
          .prepare(
            "SELECT review_id, program_id, issue_type, note, severity, recorded_at
             FROM agent_reviews WHERE program_id = ?1 ORDER BY rowid",
          )?
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawReview {
              review_id:   row.get(0)?,
              program_id:  row.get(1)?,
              issue_type:  row.get(2)?,
              note:        row.get(3)?,
              severity:    row.get(4)?,
              recorded_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rules, reqs, deadlines, sources, reviews))
      })
      .await?;

    Ok(Some(ProgramView {
      program,
      eligibility_rules: rules
        .into_iter()
        .map(RawRule::into_rule)
        .collect::<Result<_>>()?,
      requirements:      reqs
        .into_iter()
        .map(RawRequirement::into_requirement)
        .collect::<Result<_>>()?,
      deadlines:         deadlines
        .into_iter()
        .map(RawDeadline::into_deadline)
        .collect::<Result<_>>()?,
      sources:           sources
        .into_iter()
        .map(RawSource::into_source)
        .collect::<Result<_>>()?,
      reviews:           reviews
        .into_iter()
        .map(RawReview::into_review)
        .collect::<Result<_>>()?,
    }))
  }

  async fn list_programs(&self, query: &ProgramQuery) -> Result<Vec<Program>> {
    let text_pattern = query.text.as_deref().map(|t| format!("%{t}%"));
    let level        = query.level.map(|l| l.as_ref().to_owned());
    let funding_type = query.funding_type.map(|f| f.as_ref().to_owned());
    let limit_val    = query.limit.unwrap_or(100) as i64;
    let offset_val   = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawProgram> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PROGRAM_COLUMNS} FROM programs
           WHERE (?1 IS NULL OR name LIKE ?1 OR provider LIKE ?1)
             AND (?2 IS NULL OR level = ?2)
             AND (?3 IS NULL OR funding_type = ?3)
           ORDER BY last_verified_at DESC
           LIMIT ?4 OFFSET ?5"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              text_pattern.as_deref(),
              level.as_deref(),
              funding_type.as_deref(),
              limit_val,
              offset_val,
            ],
            RawProgram::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProgram::into_program).collect()
  }
}
