//! GitHub repository search adapter.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;

use aipulse_core::SourceKind;

use crate::error::CollectError;
use crate::types::RawItem;

const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const AI_QUERY: &str = "artificial-intelligence OR machine-learning OR LLM";
pub(super) const PRIMARY_CAP: usize = 20;
pub(super) const TRENDING_CAP: usize = 15;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<GithubRepo>,
}

/// A repository as returned by the GitHub search and repo APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub stargazers_count: Option<i64>,
    pub forks_count: Option<i64>,
    pub open_issues_count: Option<i64>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub language: Option<String>,
    pub created_at: Option<chrono::DateTime<Utc>>,
    pub pushed_at: Option<chrono::DateTime<Utc>>,
}

/// Client for the GitHub REST API. The token is optional; unauthenticated
/// requests work with a lower rate limit.
pub struct GithubClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GithubClient {
    /// Creates a client pointed at the production GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        token: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, CollectError> {
        Self::with_base_url(token, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on client construction failure or
    /// [`CollectError::Api`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        token: Option<&str>,
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

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()).map(str::to_owned),
        })
    }

    /// Fetches AI/ML repository candidates: a primary query sorted by most
    /// recent push plus a secondary "trending" query (created in the last 7
    /// days, sorted by stars), merged by URL.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] when either search request fails outright.
    pub async fn fetch_candidates(&self) -> Result<Vec<RawItem>, CollectError> {
        let primary = self
            .search(AI_QUERY, "updated", PRIMARY_CAP)
            .await?
            .into_iter()
            .map(to_raw_item)
            .collect();

        let week_ago = (Utc::now() - chrono::Duration::days(7)).format("%Y-%m-%d");
        let trending_query = format!("{AI_QUERY} created:>{week_ago}");
        let trending = self
            .search(&trending_query, "stars", TRENDING_CAP)
            .await?
            .into_iter()
            .map(to_raw_item)
            .collect();

        Ok(super::merge_by_url(primary, trending))
    }

    /// Fetches current repository metrics for a metadata refresh.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or non-2xx status,
    /// or [`CollectError::Deserialize`] on an unexpected body shape.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<GithubRepo, CollectError> {
        let url = self
            .base_url
            .join(&format!("repos/{owner}/{repo}"))
            .map_err(|e| CollectError::Api(format!("invalid repo path: {e}")))?;

        let body = self.request(url.clone(), &[]).await?;
        serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    async fn search(
        &self,
        query: &str,
        sort: &str,
        per_page: usize,
    ) -> Result<Vec<GithubRepo>, CollectError> {
        let url = self
            .base_url
            .join("search/repositories")
            .map_err(|e| CollectError::Api(format!("invalid search path: {e}")))?;

        let per_page = per_page.to_string();
        let params = [
            ("q", query),
            ("sort", sort),
            ("order", "desc"),
            ("per_page", &per_page),
        ];

        let body = self.request(url.clone(), &params).await?;
        let response: SearchResponse =
            serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(response.items)
    }

    async fn request(&self, url: Url, params: &[(&str, &str)]) -> Result<String, CollectError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

fn to_raw_item(repo: GithubRepo) -> RawItem {
    let mut item = RawItem::new(SourceKind::Github, repo.full_name.clone(), repo.html_url);
    item.description = repo.description;
    item.tags = repo.topics.clone();
    item.signals.stars = repo.stargazers_count;
    item.signals.forks = repo.forks_count;
    item.signals.open_issues = repo.open_issues_count;
    item.published_at = repo.created_at;

    // Growth rate derived from repo age; young repos get at least a day so a
    // launch-day repo does not divide by zero.
    if let (Some(stars), Some(created)) = (repo.stargazers_count, repo.created_at) {
        let age_days = (Utc::now() - created).num_days().max(1);
        #[allow(clippy::cast_precision_loss)]
        let growth = stars as f64 / age_days as f64;
        item.signals.star_growth_per_day = Some(growth);
    }

    item.raw
        .insert("full_name".to_owned(), repo.full_name.into());
    if let Some(language) = repo.language {
        item.raw.insert("language".to_owned(), language.into());
    }
    if !repo.topics.is_empty() {
        item.raw.insert("topics".to_owned(), repo.topics.into());
    }
    if let Some(pushed_at) = repo.pushed_at {
        item.raw
            .insert("pushed_at".to_owned(), pushed_at.to_rfc3339().into());
    }

    item
}
