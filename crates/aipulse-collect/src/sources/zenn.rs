//! Zenn articles adapter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;

use aipulse_core::SourceKind;

use crate::error::CollectError;
use crate::types::RawItem;

const DEFAULT_BASE_URL: &str = "https://zenn.dev/";
const TOPIC: &str = "ai";
pub(super) const QUERY_CAP: usize = 20;

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    articles: Vec<ZennArticle>,
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    article: ZennArticle,
}

/// An article as returned by the Zenn API (listing and detail shapes share
/// these fields).
#[derive(Debug, Clone, Deserialize)]
pub struct ZennArticle {
    pub title: String,
    pub slug: String,
    pub path: Option<String>,
    pub liked_count: Option<i64>,
    pub comments_count: Option<i64>,
    pub article_type: Option<String>,
    pub body_letters_count: Option<i64>,
    #[serde(default)]
    pub is_premium: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub user: Option<ZennUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZennUser {
    pub username: String,
}

/// Client for the Zenn articles API.
pub struct ZennClient {
    client: Client,
    base_url: Url,
}

impl ZennClient {
    /// Creates a client pointed at the production Zenn API.
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

    /// Fetches the latest articles under the AI topic, capped at
    /// [`QUERY_CAP`].
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or
    /// [`CollectError::Deserialize`] on an unexpected body shape.
    pub async fn fetch_candidates(&self) -> Result<Vec<RawItem>, CollectError> {
        let url = self
            .base_url
            .join("api/articles")
            .map_err(|e| CollectError::Api(format!("invalid articles path: {e}")))?;

        let count = QUERY_CAP.to_string();
        let body = self
            .client
            .get(url.clone())
            .query(&[("topicname", TOPIC), ("order", "latest"), ("count", &count)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: ArticlesResponse =
            serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(response.articles.into_iter().map(to_raw_item).collect())
    }

    /// Fetches one article's current liked/comment counts, for a metadata
    /// refresh.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or non-2xx status,
    /// or [`CollectError::Deserialize`] on an unexpected body shape.
    pub async fn get_article(&self, slug: &str) -> Result<ZennArticle, CollectError> {
        let url = self
            .base_url
            .join(&format!("api/articles/{slug}"))
            .map_err(|e| CollectError::Api(format!("invalid article path: {e}")))?;

        let body = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: ArticleResponse =
            serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(response.article)
    }
}

fn to_raw_item(article: ZennArticle) -> RawItem {
    let url = match &article.path {
        Some(path) => format!("https://zenn.dev{path}"),
        None => format!("https://zenn.dev/articles/{}", article.slug),
    };

    let mut item = RawItem::new(SourceKind::Zenn, article.title.clone(), url);
    item.signals.likes = article.liked_count;
    item.signals.comment_count = article.comments_count;
    item.signals.is_premium = article.is_premium;
    item.published_at = article.published_at;

    item.raw.insert("slug".to_owned(), article.slug.into());
    if let Some(user) = article.user {
        item.raw.insert("username".to_owned(), user.username.into());
    }
    if let Some(article_type) = article.article_type {
        item.raw
            .insert("article_type".to_owned(), article_type.into());
    }
    if let Some(letters) = article.body_letters_count {
        item.raw
            .insert("body_letters_count".to_owned(), letters.into());
    }

    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> ZennArticle {
        ZennArticle {
            title: "RAGの実装パターン".to_owned(),
            slug: "rag-patterns".to_owned(),
            path: Some("/acme/articles/rag-patterns".to_owned()),
            liked_count: Some(85),
            comments_count: Some(6),
            article_type: Some("tech".to_owned()),
            body_letters_count: Some(5400),
            is_premium: Some(false),
            published_at: Some(Utc::now()),
            user: Some(ZennUser {
                username: "acme".to_owned(),
            }),
        }
    }

    #[test]
    fn to_raw_item_builds_url_from_path() {
        let item = to_raw_item(sample_article());
        assert_eq!(item.url, "https://zenn.dev/acme/articles/rag-patterns");
        assert_eq!(item.signals.likes, Some(85));
        assert_eq!(item.signals.comment_count, Some(6));
        assert_eq!(item.raw["slug"], "rag-patterns");
        assert_eq!(item.raw["username"], "acme");
        assert_eq!(item.raw["body_letters_count"], 5400);
    }

    #[test]
    fn missing_path_falls_back_to_slug_url() {
        let mut article = sample_article();
        article.path = None;
        let item = to_raw_item(article);
        assert_eq!(item.url, "https://zenn.dev/articles/rag-patterns");
    }
}
