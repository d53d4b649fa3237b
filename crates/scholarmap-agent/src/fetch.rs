//! [`HttpFetcher`]: the reqwest-backed [`PageFetcher`].

use std::time::Duration;

use scholarmap_core::fetch::{FetchedPage, PageFetcher};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str =
  "Mozilla/5.0 (compatible; ScholarMapAgent/1.0)";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("HTTP {0}")]
  Status(reqwest::StatusCode),
}

/// GETs pages with a browser-like user agent, following redirects.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
      .user_agent(user_agent)
      .build()
      .map_err(FetchError::Client)?;
    Ok(Self { client })
  }
}

impl PageFetcher for HttpFetcher {
  type Error = FetchError;

  async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
    debug!(%url, "HTTP fetch starting");
    let response = self.client.get(url.clone()).send().await?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status));
    }

    let final_url = response.url().clone();
    let text = response.text().await?;
    debug!(%url, %final_url, bytes = text.len(), "HTTP fetch finished");

    Ok(FetchedPage { url: final_url, status: status.as_u16(), text })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    Router,
    http::{HeaderMap, StatusCode, header},
    response::Redirect,
    routing::get,
  };
  use tokio::net::TcpListener;

  async fn serve(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Url::parse(&format!("http://{addr}/")).unwrap()
  }

  fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5), DEFAULT_USER_AGENT).unwrap()
  }

  #[tokio::test]
  async fn returns_body_and_final_url() {
    let base = serve(
      Router::new()
        .route("/old", get(|| async { Redirect::permanent("/page") }))
        .route("/page", get(|| async { "<h1>Fellowship</h1>" })),
    )
    .await;

    let page = fetcher().fetch(&base.join("old").unwrap()).await.unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.text, "<h1>Fellowship</h1>");
    assert_eq!(page.url.path(), "/page");
  }

  #[tokio::test]
  async fn non_success_status_is_an_error() {
    let base = serve(
      Router::new().route("/gone", get(|| async { StatusCode::NOT_FOUND })),
    )
    .await;

    let err = fetcher().fetch(&base.join("gone").unwrap()).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(s) if s == StatusCode::NOT_FOUND));
    assert_eq!(err.to_string(), "HTTP 404 Not Found");
  }

  #[tokio::test]
  async fn sends_configured_user_agent() {
    let base = serve(Router::new().route(
      "/ua",
      get(|headers: HeaderMap| async move {
        headers
          .get(header::USER_AGENT)
          .and_then(|v| v.to_str().ok())
          .unwrap_or_default()
          .to_string()
      }),
    ))
    .await;

    let page = fetcher().fetch(&base.join("ua").unwrap()).await.unwrap();
    assert_eq!(page.text, DEFAULT_USER_AGENT);
  }

  #[tokio::test]
  async fn unreachable_host_is_a_request_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/")).unwrap();
    let err = fetcher().fetch(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Request(_)));
  }
}
