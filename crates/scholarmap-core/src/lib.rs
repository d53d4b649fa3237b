//! Core types and trait definitions for the ScholarMap ingestion agent.
//!
//! This crate has no HTTP server or database dependencies.
//! The fetcher, the language-model extractor and the program store are all
//! expressed as traits here and implemented by the outer crates.

// Native `async fn` in traits; the returned futures are declared `Send`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod extract;
pub mod extraction;
pub mod fetch;
pub mod pipeline;
pub mod program;
pub mod store;

pub use error::{BoxError, Error, IngestError, Result};
