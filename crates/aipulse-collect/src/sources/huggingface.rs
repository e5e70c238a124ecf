//! Hugging Face Hub models adapter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;

use aipulse_core::SourceKind;

use crate::error::CollectError;
use crate::types::RawItem;

const DEFAULT_BASE_URL: &str = "https://huggingface.co/";
pub(super) const PRIMARY_CAP: usize = 20;
pub(super) const TRENDING_CAP: usize = 15;

/// A model as returned by the Hub models API.
#[derive(Debug, Clone, Deserialize)]
pub struct HuggingFaceModel {
    #[serde(alias = "modelId")]
    pub id: String,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub pipeline_tag: Option<String>,
    pub library_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Client for the Hugging Face Hub API.
pub struct HuggingFaceClient {
    client: Client,
    base_url: Url,
}

impl HuggingFaceClient {
    /// Creates a client pointed at the production Hub API.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, CollectError> {
        Self::with_base_url(timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on client construction failure or
    /// [`CollectError::Api`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| CollectError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Fetches model candidates: most-downloaded models plus a secondary
    /// most-liked ("trending") listing, merged by URL.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] when either listing request fails outright.
    pub async fn fetch_candidates(&self) -> Result<Vec<RawItem>, CollectError> {
        let primary = self.list_models("downloads", PRIMARY_CAP).await?;
        let trending = self.list_models("likes", TRENDING_CAP).await?;

        let primary = primary.into_iter().map(to_raw_item).collect();
        let trending = trending.into_iter().map(to_raw_item).collect();

        Ok(super::merge_by_url(primary, trending))
    }

    /// Fetches current downloads/likes for one model, for a metadata refresh.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or non-2xx status,
    /// or [`CollectError::Deserialize`] on an unexpected body shape.
    pub async fn get_model(&self, model_id: &str) -> Result<HuggingFaceModel, CollectError> {
        let url = self
            .base_url
            .join(&format!("api/models/{model_id}"))
            .map_err(|e| CollectError::Api(format!("invalid model path: {e}")))?;

        let body = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    async fn list_models(
        &self,
        sort: &str,
        limit: usize,
    ) -> Result<Vec<HuggingFaceModel>, CollectError> {
        let url = self
            .base_url
            .join("api/models")
            .map_err(|e| CollectError::Api(format!("invalid models path: {e}")))?;

        let limit = limit.to_string();
        let body = self
            .client
            .get(url.clone())
            .query(&[
                ("sort", sort),
                ("direction", "-1"),
                ("limit", &limit),
                ("full", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

fn to_raw_item(model: HuggingFaceModel) -> RawItem {
    // Item identity is the canonical hub URL regardless of which base URL the
    // listing was fetched from.
    let url = format!("https://huggingface.co/{}", model.id);
    let mut item = RawItem::new(SourceKind::Huggingface, model.id.clone(), url);

    // The listing API has no free-text description; the pipeline tag and
    // library name are the closest thing to one.
    item.description = match (&model.pipeline_tag, &model.library_name) {
        (Some(pipeline), Some(library)) => Some(format!("{pipeline} model ({library})")),
        (Some(pipeline), None) => Some(format!("{pipeline} model")),
        _ => None,
    };
    item.tags = model
        .tags
        .iter()
        .filter(|t| !t.contains(':'))
        .take(8)
        .cloned()
        .collect();
    item.signals.downloads = model.downloads;
    item.signals.likes = model.likes;
    item.published_at = model.created_at;

    if let (Some(downloads), Some(created)) = (model.downloads, model.created_at) {
        let age_days = (Utc::now() - created).num_days().max(1);
        #[allow(clippy::cast_precision_loss)]
        let growth = downloads as f64 / age_days as f64;
        item.signals.download_growth_per_day = Some(growth);
    }

    item.raw.insert("model_id".to_owned(), model.id.into());
    if let Some(pipeline_tag) = model.pipeline_tag {
        item.raw
            .insert("pipeline_tag".to_owned(), pipeline_tag.into());
    }
    if let Some(library_name) = model.library_name {
        item.raw
            .insert("library_name".to_owned(), library_name.into());
    }

    item
}
