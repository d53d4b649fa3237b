//! Program records: the rows the agent writes for each scholarship or
//! fellowship page it ingests.
//!
//! A [`Program`] is the parent row. Its eligibility rules, requirements and
//! deadlines are replaced wholesale on every re-ingestion; [`Source`] and
//! [`AgentReview`] rows are append-only history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

// ─── Enumerations ────────────────────────────────────────────────────────────
//
// Every enum parses case-insensitively from its snake_case name so that model
// output like "PhD" or "Tuition_Only" still lands on a variant.

/// Degree level a program is aimed at.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Level {
  Bachelor,
  #[default]
  Masters,
  Phd,
  Postdoc,
}

/// How much of the cost of study the award covers.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FundingType {
  Full,
  #[default]
  Partial,
  TuitionOnly,
  StipendOnly,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProgramStatus {
  #[default]
  Active,
  Closed,
}

/// The criterion an [`EligibilityRule`] constrains.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RuleType {
  Gpa,
  Degree,
  Nationality,
  Age,
  WorkExperience,
  Language,
  #[default]
  Other,
}

/// How directly a rule is backed by the page text.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RuleConfidence {
  High,
  Medium,
  #[default]
  Inferred,
}

/// A document or step an applicant must supply.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RequirementType {
  Transcript,
  Cv,
  Essay,
  References,
  Proposal,
  Test,
  Interview,
  #[default]
  Other,
}

/// The stage of the selection cycle a deadline closes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DeadlineStage {
  #[default]
  Application,
  Interview,
  Nomination,
  Result,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IssueType {
  Suspicious,
  MissingData,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
  High,
  Low,
}

// ─── Stored rows ─────────────────────────────────────────────────────────────

/// A scholarship or fellowship opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
  pub program_id:         Uuid,
  pub name:               String,
  pub provider:           String,
  pub level:              Level,
  pub funding_type:       FundingType,
  pub countries_eligible: Vec<String>,
  pub countries_of_study: Vec<String>,
  pub fields:             Vec<String>,
  pub official_url:       String,
  pub description:        Option<String>,
  pub who_wins:           Option<String>,
  pub rejection_reasons:  Option<String>,
  pub status:             ProgramStatus,
  pub last_verified_at:   DateTime<Utc>,
  /// Server-assigned; survives re-ingestion.
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRule {
  pub rule_id:        Uuid,
  pub program_id:     Uuid,
  pub rule_type:      RuleType,
  /// Free-form comparison, e.g. `">="` or `"in"`.
  pub operator:       String,
  /// Loosely-typed payload, e.g. `{"min": 3.0}`.
  pub value:          serde_json::Value,
  pub confidence:     RuleConfidence,
  /// Quote from the page backing the rule.
  pub source_snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
  pub requirement_id:   Uuid,
  pub program_id:       Uuid,
  pub requirement_type: RequirementType,
  pub description:      String,
  pub mandatory:        bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
  pub deadline_id:   Uuid,
  pub program_id:    Uuid,
  /// Application cycle label, e.g. `"2025/2026"`.
  pub cycle:         String,
  pub deadline_date: Option<NaiveDate>,
  pub stage:         DeadlineStage,
}

/// Audit row written once per ingestion attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
  pub source_id:        Uuid,
  pub program_id:       Uuid,
  pub url:              String,
  pub agent_model:      String,
  /// The model's JSON answer, re-serialised and truncated.
  pub raw_summary:      String,
  pub confidence_score: f64,
  pub recorded_at:      DateTime<Utc>,
}

/// A data-quality flag raised during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReview {
  pub review_id:   Uuid,
  pub program_id:  Uuid,
  pub issue_type:  IssueType,
  pub note:        String,
  pub severity:    Severity,
  pub recorded_at: DateTime<Utc>,
}

/// The computed read model for a program. Never stored, always assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramView {
  pub program:           Program,
  pub eligibility_rules: Vec<EligibilityRule>,
  pub requirements:      Vec<Requirement>,
  pub deadlines:         Vec<Deadline>,
  /// Oldest first.
  pub sources:           Vec<Source>,
  /// Oldest first.
  pub reviews:           Vec<AgentReview>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────
//
// Identifiers and `created_at`/`recorded_at` timestamps are always assigned by
// the store; they are not accepted from callers.

#[derive(Debug, Clone, PartialEq)]
pub struct NewProgram {
  pub name:               String,
  pub provider:           String,
  pub level:              Level,
  pub funding_type:       FundingType,
  pub countries_eligible: Vec<String>,
  pub countries_of_study: Vec<String>,
  pub fields:             Vec<String>,
  pub official_url:       String,
  pub description:        Option<String>,
  pub who_wins:           Option<String>,
  pub rejection_reasons:  Option<String>,
  pub status:             ProgramStatus,
  pub last_verified_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEligibilityRule {
  pub rule_type:      RuleType,
  pub operator:       String,
  pub value:          serde_json::Value,
  pub confidence:     RuleConfidence,
  pub source_snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRequirement {
  pub requirement_type: RequirementType,
  pub description:      String,
  pub mandatory:        bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDeadline {
  pub cycle:         String,
  pub deadline_date: Option<NaiveDate>,
  pub stage:         DeadlineStage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
  pub url:              String,
  pub agent_model:      String,
  pub raw_summary:      String,
  pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
  pub issue_type: IssueType,
  pub note:       String,
  pub severity:   Severity,
}

/// Everything one ingestion writes, in a single unit handed to
/// [`crate::store::ProgramStore::persist`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewIngestion {
  pub program:           NewProgram,
  pub eligibility_rules: Vec<NewEligibilityRule>,
  pub requirements:      Vec<NewRequirement>,
  pub deadlines:         Vec<NewDeadline>,
  pub source:            NewSource,
  /// One review row per reported issue.
  pub reviews:           Vec<NewReview>,
}

impl NewIngestion {
  /// The issue notes, in the order they will be persisted.
  pub fn issues(&self) -> Vec<String> {
    self.reviews.iter().map(|r| r.note.clone()).collect()
  }

  pub fn confidence(&self) -> f64 { self.source.confidence_score }
}
