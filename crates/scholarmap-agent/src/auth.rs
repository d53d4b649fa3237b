//! Shared-secret bearer auth: extractor and standalone verifier.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use sha2::{Digest, Sha256};

use crate::{AppState, error::Error};

/// The secret callers must present as `Authorization: Bearer <secret>`.
///
/// Only a SHA-256 digest is kept; presented tokens are compared digest to
/// digest.
#[derive(Clone)]
pub struct AuthConfig {
  secret_digest: [u8; 32],
}

impl AuthConfig {
  pub fn new(secret: &str) -> Self {
    Self { secret_digest: Sha256::digest(secret.as_bytes()).into() }
  }

  fn accepts(&self, token: &str) -> bool {
    let presented: [u8; 32] = Sha256::digest(token.as_bytes()).into();
    presented == self.secret_digest
  }
}

/// Zero-size marker: present in the handler means the request was authenticated.
pub struct Authenticated;

/// Verify the bearer token directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let token = header_val
    .strip_prefix("Bearer ")
    .ok_or(Error::Unauthorized)?;

  if !config.accepts(token) {
    return Err(Error::Unauthorized);
  }
  Ok(())
}

impl<F, E, S> FromRequestParts<AppState<F, E, S>> for Authenticated
where
  F: Send + Sync,
  E: Send + Sync,
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<F, E, S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth)?;
    Ok(Authenticated)
  }
}
