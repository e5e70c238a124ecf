//! Collection pipeline for aipulse: source adapters, quality scoring,
//! dedup + persistence, AI enrichment with heuristic fallback, batched
//! metadata refresh, and per-run health records.

pub mod enrich;
mod error;
pub mod metadata;
pub mod pipeline;
pub mod scorer;
pub mod sources;
pub mod summary;
pub mod types;

pub use enrich::enrich_pending;
pub use error::CollectError;
pub use metadata::{batch_sizes, refresh_metadata, EnrichReport};
pub use pipeline::{Collector, RunSummary, SourceReport};
pub use sources::SourceClients;
pub use types::{RawItem, SourceSignals};
