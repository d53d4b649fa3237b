//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. String lists and rule payloads are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings. Enums are stored as their
//! snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use scholarmap_core::program::{
  AgentReview, Deadline, EligibilityRule, NewIngestion, Program, Requirement,
  Source,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::InvalidEnum { column, value: s.to_owned() })
}

// ─── Ingestion → column values ───────────────────────────────────────────────

/// Every column value one `persist` call writes, encoded up front so the
/// blocking closure only moves plain strings.
pub struct EncodedIngestion {
  pub program:   EncodedProgram,
  pub rules:     Vec<EncodedRule>,
  pub reqs:      Vec<EncodedRequirement>,
  pub deadlines: Vec<EncodedDeadline>,
  pub source:    EncodedSource,
  pub reviews:   Vec<EncodedReview>,
}

pub struct EncodedProgram {
  pub name:               String,
  pub provider:           String,
  pub level:              String,
  pub funding_type:       String,
  pub countries_eligible: String,
  pub countries_of_study: String,
  pub fields:             String,
  pub official_url:       String,
  pub description:        Option<String>,
  pub who_wins:           Option<String>,
  pub rejection_reasons:  Option<String>,
  pub status:             String,
  pub last_verified_at:   String,
}

pub struct EncodedRule {
  pub rule_id:        String,
  pub rule_type:      String,
  pub operator:       String,
  pub value_json:     String,
  pub confidence:     String,
  pub source_snippet: Option<String>,
}

pub struct EncodedRequirement {
  pub requirement_id:   String,
  pub requirement_type: String,
  pub description:      String,
  pub mandatory:        bool,
}

pub struct EncodedDeadline {
  pub deadline_id:   String,
  pub cycle:         String,
  pub deadline_date: Option<String>,
  pub stage:         String,
}

pub struct EncodedSource {
  pub source_id:        String,
  pub url:              String,
  pub agent_model:      String,
  pub raw_summary:      String,
  pub confidence_score: f64,
}

pub struct EncodedReview {
  pub review_id:  String,
  pub issue_type: String,
  pub note:       String,
  pub severity:   String,
}

pub fn encode_ingestion(ingestion: NewIngestion) -> Result<EncodedIngestion> {
  let NewIngestion {
    program: p,
    eligibility_rules,
    requirements,
    deadlines,
    source,
    reviews,
  } = ingestion;

  let program = EncodedProgram {
    name:               p.name,
    provider:           p.provider,
    level:              p.level.as_ref().to_owned(),
    funding_type:       p.funding_type.as_ref().to_owned(),
    countries_eligible: encode_list(&p.countries_eligible)?,
    countries_of_study: encode_list(&p.countries_of_study)?,
    fields:             encode_list(&p.fields)?,
    official_url:       p.official_url,
    description:        p.description,
    who_wins:           p.who_wins,
    rejection_reasons:  p.rejection_reasons,
    status:             p.status.as_ref().to_owned(),
    last_verified_at:   encode_dt(p.last_verified_at),
  };

  let rules = eligibility_rules
    .into_iter()
    .map(|r| {
      Ok(EncodedRule {
        rule_id:        encode_uuid(Uuid::new_v4()),
        rule_type:      r.rule_type.as_ref().to_owned(),
        operator:       r.operator,
        value_json:     serde_json::to_string(&r.value)?,
        confidence:     r.confidence.as_ref().to_owned(),
        source_snippet: r.source_snippet,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  let reqs = requirements
    .into_iter()
    .map(|r| EncodedRequirement {
      requirement_id:   encode_uuid(Uuid::new_v4()),
      requirement_type: r.requirement_type.as_ref().to_owned(),
      description:      r.description,
      mandatory:        r.mandatory,
    })
    .collect();

  let deadlines = deadlines
    .into_iter()
    .map(|d| EncodedDeadline {
      deadline_id:   encode_uuid(Uuid::new_v4()),
      cycle:         d.cycle,
      deadline_date: d.deadline_date.map(encode_date),
      stage:         d.stage.as_ref().to_owned(),
    })
    .collect();

  let source = EncodedSource {
    source_id:        encode_uuid(Uuid::new_v4()),
    url:              source.url,
    agent_model:      source.agent_model,
    raw_summary:      source.raw_summary,
    confidence_score: source.confidence_score,
  };

  let reviews = reviews
    .into_iter()
    .map(|r| EncodedReview {
      review_id:  encode_uuid(Uuid::new_v4()),
      issue_type: r.issue_type.as_ref().to_owned(),
      note:       r.note,
      severity:   r.severity.as_ref().to_owned(),
    })
    .collect();

  Ok(EncodedIngestion { program, rules, reqs, deadlines, source, reviews })
}

// ─── Raw rows → domain types ─────────────────────────────────────────────────

pub const PROGRAM_COLUMNS: &str = "program_id, name, provider, level, funding_type,
  countries_eligible, countries_of_study, fields, official_url, description,
  who_wins, rejection_reasons, status, last_verified_at, created_at, updated_at";

/// Intermediate struct for reading a `programs` row.
pub struct RawProgram {
  pub program_id:         String,
  pub name:               String,
  pub provider:           String,
  pub level:              String,
  pub funding_type:       String,
  pub countries_eligible: String,
  pub countries_of_study: String,
  pub fields:             String,
  pub official_url:       String,
  pub description:        Option<String>,
  pub who_wins:           Option<String>,
  pub rejection_reasons:  Option<String>,
  pub status:             String,
  pub last_verified_at:   String,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawProgram {
  /// Read a row selected with [`PROGRAM_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      program_id:         row.get(0)?,
      name:               row.get(1)?,
      provider:           row.get(2)?,
      level:              row.get(3)?,
      funding_type:       row.get(4)?,
      countries_eligible: row.get(5)?,
      countries_of_study: row.get(6)?,
      fields:             row.get(7)?,
      official_url:       row.get(8)?,
      description:        row.get(9)?,
      who_wins:           row.get(10)?,
      rejection_reasons:  row.get(11)?,
      status:             row.get(12)?,
      last_verified_at:   row.get(13)?,
      created_at:         row.get(14)?,
      updated_at:         row.get(15)?,
    })
  }

  pub fn into_program(self) -> Result<Program> {
    Ok(Program {
      program_id:         decode_uuid(&self.program_id)?,
      name:               self.name,
      provider:           self.provider,
      level:              decode_enum("level", &self.level)?,
      funding_type:       decode_enum("funding_type", &self.funding_type)?,
      countries_eligible: decode_list(&self.countries_eligible)?,
      countries_of_study: decode_list(&self.countries_of_study)?,
      fields:             decode_list(&self.fields)?,
      official_url:       self.official_url,
      description:        self.description,
      who_wins:           self.who_wins,
      rejection_reasons:  self.rejection_reasons,
      status:             decode_enum("status", &self.status)?,
      last_verified_at:   decode_dt(&self.last_verified_at)?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawRule {
  pub rule_id:        String,
  pub program_id:     String,
  pub rule_type:      String,
  pub operator:       String,
  pub value_json:     String,
  pub confidence:     String,
  pub source_snippet: Option<String>,
}

impl RawRule {
  pub fn into_rule(self) -> Result<EligibilityRule> {
    Ok(EligibilityRule {
      rule_id:        decode_uuid(&self.rule_id)?,
      program_id:     decode_uuid(&self.program_id)?,
      rule_type:      decode_enum("rule_type", &self.rule_type)?,
      operator:       self.operator,
      value:          serde_json::from_str(&self.value_json)?,
      confidence:     decode_enum("confidence", &self.confidence)?,
      source_snippet: self.source_snippet,
    })
  }
}

pub struct RawRequirement {
  pub requirement_id:   String,
  pub program_id:       String,
  pub requirement_type: String,
  pub description:      String,
  pub mandatory:        bool,
}

impl RawRequirement {
  pub fn into_requirement(self) -> Result<Requirement> {
    Ok(Requirement {
      requirement_id:   decode_uuid(&self.requirement_id)?,
      program_id:       decode_uuid(&self.program_id)?,
      requirement_type: decode_enum("requirement_type", &self.requirement_type)?,
      description:      self.description,
      mandatory:        self.mandatory,
    })
  }
}

pub struct RawDeadline {
  pub deadline_id:   String,
  pub program_id:    String,
  pub cycle:         String,
  pub deadline_date: Option<String>,
  pub stage:         String,
}

impl RawDeadline {
  pub fn into_deadline(self) -> Result<Deadline> {
    Ok(Deadline {
      deadline_id:   decode_uuid(&self.deadline_id)?,
      program_id:    decode_uuid(&self.program_id)?,
      cycle:         self.cycle,
      deadline_date: self.deadline_date.as_deref().map(decode_date).transpose()?,
      stage:         decode_enum("stage", &self.stage)?,
    })
  }
}

pub struct RawSource {
  pub source_id:        String,
  pub program_id:       String,
  pub url:              String,
  pub agent_model:      String,
  pub raw_summary:      String,
  pub confidence_score: f64,
  pub recorded_at:      String,
}

impl RawSource {
  pub fn into_source(self) -> Result<Source> {
    Ok(Source {
      source_id:        decode_uuid(&self.source_id)?,
      program_id:       decode_uuid(&self.program_id)?,
      url:              self.url,
      agent_model:      self.agent_model,
      raw_summary:      self.raw_summary,
      confidence_score: self.confidence_score,
      recorded_at:      decode_dt(&self.recorded_at)?,
    })
  }
}

pub struct RawReview {
  pub review_id:   String,
  pub program_id:  String,
  pub issue_type:  String,
  pub note:        String,
  pub severity:    String,
  pub recorded_at: String,
}

impl RawReview {
  pub fn into_review(self) -> Result<AgentReview> {
    Ok(AgentReview {
      review_id:   decode_uuid(&self.review_id)?,
      program_id:  decode_uuid(&self.program_id)?,
      issue_type:  decode_enum("issue_type", &self.issue_type)?,
      note:        self.note,
      severity:    decode_enum("severity", &self.severity)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use scholarmap_core::program::{Level, Severity};

  use super::*;

  #[test]
  fn enum_columns_round_trip_through_names() {
    let level: Level = decode_enum("level", Level::Postdoc.as_ref()).unwrap();
    assert_eq!(level, Level::Postdoc);
    assert!(matches!(
      decode_enum::<Severity>("severity", "critical"),
      Err(Error::InvalidEnum { column: "severity", .. })
    ));
  }

  #[test]
  fn dates_use_calendar_format() {
    let d = NaiveDate::from_ymd_opt(2025, 11, 15).unwrap();
    assert_eq!(encode_date(d), "2025-11-15");
    assert_eq!(decode_date("2025-11-15").unwrap(), d);
    assert!(decode_date("15/11/2025").is_err());
  }
}
