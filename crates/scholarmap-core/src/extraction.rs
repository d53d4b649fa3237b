//! The extraction contract between the agent and the language model.
//!
//! The model is asked (not required) to answer with a fixed JSON shape. No
//! field is guaranteed to be present or well-typed, so parsing is lenient:
//! anything missing or malformed is treated as absent, and
//! [`ExtractionResult::into_ingestion`] substitutes the documented defaults.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::{
  Error, Result,
  program::{
    DeadlineStage, FundingType, IssueType, Level, NewDeadline,
    NewEligibilityRule, NewIngestion, NewProgram, NewRequirement, NewReview,
    NewSource, ProgramStatus, RequirementType, RuleConfidence, RuleType,
    Severity,
  },
};

/// Page text beyond this many characters is never sent to the model.
pub const MAX_PAGE_CHARS: usize = 50_000;

/// Upper bound on the serialised model answer kept in the source row.
pub const MAX_RAW_SUMMARY_CHARS: usize = 10_000;

/// Extractions scoring below this are flagged for manual review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Score assumed when the model omits `confidence_score`.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const LOW_CONFIDENCE_ISSUE: &str =
  "Low confidence extraction - manual review recommended";

pub const DEFAULT_NAME: &str = "Unknown Program";
pub const DEFAULT_PROVIDER: &str = "Unknown";
pub const DEFAULT_OPERATOR: &str = "exists";
pub const DEFAULT_CYCLE: &str = "2025/2026";

pub const EXTRACTION_PROMPT: &str = r#"You are reading the webpage of a scholarship or fellowship program. Extract its details as structured data.

Answer with ONLY a JSON object of this shape:
{
  "name": "Program name",
  "provider": "Organization offering the program",
  "level": "bachelor" | "masters" | "phd" | "postdoc",
  "funding_type": "full" | "partial" | "tuition_only" | "stipend_only",
  "countries_eligible": ["country1", "country2"],
  "countries_of_study": ["country1"],
  "fields": ["field1", "field2"],
  "description": "Short description",
  "who_wins": "Profile of typical winners",
  "rejection_reasons": "Common reasons applicants are rejected",
  "eligibility_rules": [
    {"rule_type": "gpa", "operator": ">=", "value": {"min": 3.0}, "confidence": "high", "source_snippet": "quote from the page"},
    {"rule_type": "nationality", "operator": "in", "value": {"countries": ["Ghana", "Nigeria"]}, "confidence": "high", "source_snippet": "quote"}
  ],
  "requirements": [
    {"type": "transcript", "description": "Official transcripts", "mandatory": true},
    {"type": "essay", "description": "500-word personal statement", "mandatory": true}
  ],
  "deadlines": [
    {"cycle": "2025/2026", "deadline_date": "2025-11-15", "stage": "application"}
  ],
  "confidence_score": 0.85,
  "issues": ["Any concerns about data quality"]
}

Constraints:
- level is one of: bachelor, masters, phd, postdoc
- funding_type is one of: full, partial, tuition_only, stipend_only
- rule_type is one of: gpa, degree, nationality, age, work_experience, language, other
- requirement type is one of: transcript, cv, essay, references, proposal, test, interview, other
- stage is one of: application, interview, nomination, result
- confidence is one of: high, medium, inferred
- confidence_score is the overall extraction confidence between 0 and 1
- give a source_snippet for eligibility rules whenever possible

When information is not clearly stated, leave it out or set confidence to "inferred".
"#;

/// The full prompt sent to the model for `page_text`.
pub fn build_prompt(page_text: &str) -> String {
  format!("{EXTRACTION_PROMPT}\n\nWebpage content:\n{page_text}")
}

/// Truncate `s` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

// ─── Parsed result ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRule {
  pub rule_type:      Option<RuleType>,
  pub operator:       Option<String>,
  pub value:          Option<Value>,
  pub confidence:     Option<RuleConfidence>,
  pub source_snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRequirement {
  pub requirement_type: Option<RequirementType>,
  pub description:      Option<String>,
  pub mandatory:        Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDeadline {
  pub cycle:         Option<String>,
  pub deadline_date: Option<NaiveDate>,
  pub stage:         Option<DeadlineStage>,
}

/// What the model reported, with every field optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
  pub name:               Option<String>,
  pub provider:           Option<String>,
  pub level:              Option<Level>,
  pub funding_type:       Option<FundingType>,
  pub countries_eligible: Vec<String>,
  pub countries_of_study: Vec<String>,
  pub fields:             Vec<String>,
  pub description:        Option<String>,
  pub who_wins:           Option<String>,
  pub rejection_reasons:  Option<String>,
  pub eligibility_rules:  Vec<ExtractedRule>,
  pub requirements:       Vec<ExtractedRequirement>,
  pub deadlines:          Vec<ExtractedDeadline>,
  pub confidence_score:   Option<f64>,
  pub issues:             Vec<String>,
  /// The answer exactly as the model returned it.
  pub raw:                Value,
}

impl ExtractionResult {
  /// Decode the model's text answer.
  pub fn parse(text: &str) -> Result<Self> {
    let value: Value = serde_json::from_str(text)?;
    Self::from_value(value)
  }

  /// Map a decoded answer onto the contract. Only the top level is required
  /// to be an object; everything below it degrades to "absent".
  pub fn from_value(value: Value) -> Result<Self> {
    let obj = value.as_object().ok_or(Error::NotAnObject(json_kind(&value)))?;

    let result = Self {
      name:               string(obj, "name"),
      provider:           string(obj, "provider"),
      level:              variant(obj, "level"),
      funding_type:       variant(obj, "funding_type"),
      countries_eligible: strings(obj, "countries_eligible"),
      countries_of_study: strings(obj, "countries_of_study"),
      fields:             strings(obj, "fields"),
      description:        string(obj, "description"),
      who_wins:           string(obj, "who_wins"),
      rejection_reasons:  string(obj, "rejection_reasons"),
      eligibility_rules:  objects(obj, "eligibility_rules")
        .map(|o| ExtractedRule {
          rule_type:      variant(o, "rule_type"),
          operator:       string(o, "operator"),
          value:          o.get("value").filter(|v| !v.is_null()).cloned(),
          confidence:     variant(o, "confidence"),
          source_snippet: string(o, "source_snippet"),
        })
        .collect(),
      requirements:       objects(obj, "requirements")
        .map(|o| ExtractedRequirement {
          requirement_type: variant(o, "type"),
          description:      string(o, "description"),
          mandatory:        o.get("mandatory").and_then(Value::as_bool),
        })
        .collect(),
      deadlines:          objects(obj, "deadlines")
        .map(|o| ExtractedDeadline {
          cycle:         string(o, "cycle"),
          deadline_date: date(o, "deadline_date"),
          stage:         variant(o, "stage"),
        })
        .collect(),
      confidence_score:   obj.get("confidence_score").and_then(Value::as_f64),
      issues:             strings(obj, "issues"),
      raw:                value.clone(),
    };

    Ok(result)
  }

  /// The reported confidence, defaulted and clamped to `[0, 1]`.
  pub fn confidence(&self) -> f64 {
    self
      .confidence_score
      .unwrap_or(DEFAULT_CONFIDENCE)
      .clamp(0.0, 1.0)
  }

  pub fn is_low_confidence(&self) -> bool {
    self.confidence() < LOW_CONFIDENCE_THRESHOLD
  }

  /// Model-reported issues plus the synthesized low-confidence warning.
  pub fn issues_with_warnings(&self) -> Vec<String> {
    let mut issues = self.issues.clone();
    if self.is_low_confidence() {
      issues.push(LOW_CONFIDENCE_ISSUE.to_owned());
    }
    issues
  }

  /// Apply defaults and build every row one ingestion of `url` writes.
  ///
  /// Deterministic: the same result, url, model and timestamp always yield
  /// the same [`NewIngestion`].
  pub fn into_ingestion(
    self,
    url: &Url,
    agent_model: &str,
    verified_at: DateTime<Utc>,
  ) -> NewIngestion {
    let confidence = self.confidence();
    let low = self.is_low_confidence();
    let (issue_type, severity) = if low {
      (IssueType::Suspicious, Severity::High)
    } else {
      (IssueType::MissingData, Severity::Low)
    };

    let reviews = self
      .issues_with_warnings()
      .into_iter()
      .map(|note| NewReview { issue_type, note, severity })
      .collect();

    let raw_summary =
      truncate_chars(&self.raw.to_string(), MAX_RAW_SUMMARY_CHARS).to_owned();

    let program = NewProgram {
      name:               self.name.unwrap_or_else(|| DEFAULT_NAME.to_owned()),
      provider:           self
        .provider
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_owned()),
      level:              self.level.unwrap_or_default(),
      funding_type:       self.funding_type.unwrap_or_default(),
      countries_eligible: self.countries_eligible,
      countries_of_study: self.countries_of_study,
      fields:             self.fields,
      official_url:       url.to_string(),
      description:        self.description,
      who_wins:           self.who_wins,
      rejection_reasons:  self.rejection_reasons,
      status:             ProgramStatus::Active,
      last_verified_at:   verified_at,
    };

    let eligibility_rules = self
      .eligibility_rules
      .into_iter()
      .map(|r| NewEligibilityRule {
        rule_type:      r.rule_type.unwrap_or_default(),
        operator:       r.operator.unwrap_or_else(|| DEFAULT_OPERATOR.to_owned()),
        value:          r.value.unwrap_or_else(|| Value::Object(Map::new())),
        confidence:     r.confidence.unwrap_or_default(),
        source_snippet: r.source_snippet,
      })
      .collect();

    let requirements = self
      .requirements
      .into_iter()
      .map(|r| NewRequirement {
        requirement_type: r.requirement_type.unwrap_or_default(),
        description:      r.description.unwrap_or_default(),
        mandatory:        r.mandatory.unwrap_or(true),
      })
      .collect();

    let deadlines = self
      .deadlines
      .into_iter()
      .map(|d| NewDeadline {
        cycle:         d.cycle.unwrap_or_else(|| DEFAULT_CYCLE.to_owned()),
        deadline_date: d.deadline_date,
        stage:         d.stage.unwrap_or_default(),
      })
      .collect();

    NewIngestion {
      program,
      eligibility_rules,
      requirements,
      deadlines,
      source: NewSource {
        url: url.to_string(),
        agent_model: agent_model.to_owned(),
        raw_summary,
        confidence_score: confidence,
      },
      reviews,
    }
  }
}

// ─── Lenient field readers ───────────────────────────────────────────────────

/// A non-blank string field.
fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

/// The string elements of an array field; anything else is skipped.
fn strings(obj: &Map<String, Value>, key: &str) -> Vec<String> {
  obj
    .get(key)
    .and_then(Value::as_array)
    .map(|items| {
      items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
    })
    .unwrap_or_default()
}

/// The object elements of an array field.
fn objects<'a>(
  obj: &'a Map<String, Value>,
  key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
  obj
    .get(key)
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(Value::as_object)
}

fn variant<T: FromStr>(obj: &Map<String, Value>, key: &str) -> Option<T> {
  let raw = string(obj, key)?;
  match raw.parse() {
    Ok(v) => Some(v),
    Err(_) => {
      debug!(field = key, value = %raw, "ignoring unrecognised enum value");
      None
    }
  }
}

fn date(obj: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
  let raw = string(obj, key)?;
  match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
    Ok(d) => Some(d),
    Err(_) => {
      debug!(field = key, value = %raw, "ignoring unparseable date");
      None
    }
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
