//! The [`Extractor`] trait: turning page text into an [`ExtractionResult`].

use std::future::Future;

use crate::extraction::ExtractionResult;

/// A language-model backed extraction call.
///
/// Implementations build the prompt with
/// [`build_prompt`](crate::extraction::build_prompt) and decode the answer
/// with [`ExtractionResult::parse`].
pub trait Extractor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Identifier of the model, recorded on every source row.
  fn model(&self) -> &str;

  fn extract<'a>(
    &'a self,
    page_text: &'a str,
  ) -> impl Future<Output = Result<ExtractionResult, Self::Error>> + Send + 'a;
}
