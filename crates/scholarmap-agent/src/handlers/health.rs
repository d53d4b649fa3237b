//! `GET /health`: liveness probe, no auth required.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
  pub status:    &'static str,
  pub timestamp: DateTime<Utc>,
}

pub async fn handler() -> Json<Health> {
  Json(Health { status: "healthy", timestamp: Utc::now() })
}
