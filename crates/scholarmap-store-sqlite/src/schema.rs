//! SQL schema for the ScholarMap SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS programs (
    program_id         TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    provider           TEXT NOT NULL,
    level              TEXT NOT NULL,   -- 'bachelor' | 'masters' | 'phd' | 'postdoc'
    funding_type       TEXT NOT NULL,   -- 'full' | 'partial' | 'tuition_only' | 'stipend_only'
    countries_eligible TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    countries_of_study TEXT NOT NULL DEFAULT '[]',
    fields             TEXT NOT NULL DEFAULT '[]',
    official_url       TEXT NOT NULL,
    description        TEXT,
    who_wins           TEXT,
    rejection_reasons  TEXT,
    status             TEXT NOT NULL DEFAULT 'active',
    last_verified_at   TEXT NOT NULL,   -- ISO 8601 UTC
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- Rules, requirements and deadlines are replaced wholesale on re-ingestion.
CREATE TABLE IF NOT EXISTS eligibility_rules (
    rule_id        TEXT PRIMARY KEY,
    program_id     TEXT NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
    rule_type      TEXT NOT NULL,
    operator       TEXT NOT NULL,
    value_json     TEXT NOT NULL,
    confidence     TEXT NOT NULL,   -- 'high' | 'medium' | 'inferred'
    source_snippet TEXT
);

CREATE TABLE IF NOT EXISTS requirements (
    requirement_id   TEXT PRIMARY KEY,
    program_id       TEXT NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
    requirement_type TEXT NOT NULL,
    description      TEXT NOT NULL,
    mandatory        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS deadlines (
    deadline_id   TEXT PRIMARY KEY,
    program_id    TEXT NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
    cycle         TEXT NOT NULL,
    deadline_date TEXT,             -- YYYY-MM-DD
    stage         TEXT NOT NULL
);

-- Sources and reviews are strictly append-only.
CREATE TABLE IF NOT EXISTS sources (
    source_id        TEXT PRIMARY KEY,
    program_id       TEXT NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
    url              TEXT NOT NULL,
    agent_model      TEXT NOT NULL,
    raw_summary      TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    recorded_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_reviews (
    review_id   TEXT PRIMARY KEY,
    program_id  TEXT NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
    issue_type  TEXT NOT NULL,      -- 'suspicious' | 'missing_data'
    note        TEXT NOT NULL,
    severity    TEXT NOT NULL,      -- 'high' | 'low'
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rules_program_idx        ON eligibility_rules(program_id);
CREATE INDEX IF NOT EXISTS requirements_program_idx ON requirements(program_id);
CREATE INDEX IF NOT EXISTS deadlines_program_idx    ON deadlines(program_id);
CREATE INDEX IF NOT EXISTS sources_program_idx      ON sources(program_id);
CREATE INDEX IF NOT EXISTS reviews_program_idx      ON agent_reviews(program_id);
CREATE INDEX IF NOT EXISTS programs_verified_idx    ON programs(last_verified_at);

PRAGMA user_version = 1;
";
