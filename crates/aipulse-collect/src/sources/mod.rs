//! Source adapters: one HTTP client per external API.
//!
//! Each client is constructed with `new(...)` for production or
//! `with_base_url(...)` to point at a mock server in tests. Adapters fetch
//! and map, never persist; missing optional fields become `None` rather than
//! failing the fetch.

mod arxiv;
mod github;
mod huggingface;
mod zenn;

pub use arxiv::ArxivClient;
pub(crate) use arxiv::strip_version;
pub use github::{GithubClient, GithubRepo};
pub use huggingface::{HuggingFaceClient, HuggingFaceModel};
pub use zenn::{ZennArticle, ZennClient};

use aipulse_core::{AppConfig, SourceKind};

use crate::error::CollectError;
use crate::types::RawItem;

/// The four source clients bundled for the collector pipeline.
pub struct SourceClients {
    pub github: GithubClient,
    pub arxiv: ArxivClient,
    pub huggingface: HuggingFaceClient,
    pub zenn: ZennClient,
}

impl SourceClients {
    /// Builds all clients from the application config.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if an underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &AppConfig) -> Result<Self, CollectError> {
        Ok(Self {
            github: GithubClient::new(
                config.github_token.as_deref(),
                config.fetch_timeout_secs,
                &config.fetch_user_agent,
            )?,
            arxiv: ArxivClient::new(config.fetch_timeout_secs, &config.fetch_user_agent)?,
            huggingface: HuggingFaceClient::new(
                config.fetch_timeout_secs,
                &config.fetch_user_agent,
            )?,
            zenn: ZennClient::new(config.fetch_timeout_secs, &config.fetch_user_agent)?,
        })
    }

    /// Fetches candidate items for one source.
    ///
    /// # Errors
    ///
    /// Returns the adapter's [`CollectError`] when the whole fetch fails.
    pub async fn fetch(&self, kind: SourceKind) -> Result<Vec<RawItem>, CollectError> {
        match kind {
            SourceKind::Github => self.github.fetch_candidates().await,
            SourceKind::Arxiv => self.arxiv.fetch_candidates().await,
            SourceKind::Huggingface => self.huggingface.fetch_candidates().await,
            SourceKind::Zenn => self.zenn.fetch_candidates().await,
        }
    }
}

/// Upper bound on items one fetch can yield for a source (primary plus
/// secondary query caps). Recorded as `items_expected` in health records.
#[must_use]
pub fn expected_items(kind: SourceKind) -> usize {
    match kind {
        SourceKind::Github => github::PRIMARY_CAP + github::TRENDING_CAP,
        SourceKind::Arxiv => arxiv::QUERY_CAP,
        SourceKind::Huggingface => huggingface::PRIMARY_CAP + huggingface::TRENDING_CAP,
        SourceKind::Zenn => zenn::QUERY_CAP,
    }
}

/// Merges secondary query results into the primary list, dropping entries
/// whose URL is already present. Order: primary first, then new secondaries.
pub(crate) fn merge_by_url(primary: Vec<RawItem>, secondary: Vec<RawItem>) -> Vec<RawItem> {
    let mut merged = primary;
    for item in secondary {
        if !merged.iter().any(|existing| existing.url == item.url) {
            merged.push(item);
        }
    }
    merged
}
