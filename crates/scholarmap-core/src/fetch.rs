//! The [`PageFetcher`] trait: retrieving the page an ingestion reads.

use std::future::Future;

use url::Url;

/// A fetched page as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
  /// Final URL after redirects.
  pub url:    Url,
  pub status: u16,
  pub text:   String,
}

/// Abstraction over outbound page retrieval.
///
/// Implementations must treat any non-2xx response as an error; the pipeline
/// reports every fetcher error to the caller as a bad request.
pub trait PageFetcher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch<'a>(
    &'a self,
    url: &'a Url,
  ) -> impl Future<Output = Result<FetchedPage, Self::Error>> + Send + 'a;
}
