//! Best-effort AI text enrichment for collected items.
//!
//! The [`TextEnricher`] trait is the seam the collector depends on; the
//! production implementation is [`OpenAiClient`], which talks to any
//! OpenAI-compatible chat-completions endpoint. An unconfigured client
//! reports `is_available() == false` and callers fall back to heuristics —
//! enrichment failures never block ingestion.

mod client;
mod enricher;
mod error;

pub use client::OpenAiClient;
pub use enricher::TextEnricher;
pub use error::AiError;
