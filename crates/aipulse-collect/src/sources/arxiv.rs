//! arXiv Atom feed adapter plus citation-count lookups.

use std::time::Duration;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Url};
use serde::Deserialize;

use aipulse_core::SourceKind;

use crate::error::CollectError;
use crate::types::RawItem;

const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/";
const DEFAULT_CITATIONS_BASE_URL: &str = "https://api.semanticscholar.org/";
const SEARCH_QUERY: &str = "cat:cs.AI OR cat:cs.LG OR cat:cs.CL";
pub(super) const QUERY_CAP: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperResponse {
    citation_count: Option<i64>,
}

/// Client for the arXiv query API and a Semantic Scholar-style citation
/// graph endpoint.
pub struct ArxivClient {
    client: Client,
    base_url: Url,
    citations_base_url: Url,
}

impl ArxivClient {
    /// Creates a client pointed at the production arXiv and Semantic Scholar
    /// APIs.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, CollectError> {
        Self::with_base_urls(
            timeout_secs,
            user_agent,
            DEFAULT_BASE_URL,
            DEFAULT_CITATIONS_BASE_URL,
        )
    }

    /// Creates a client with custom base URLs (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on client construction failure or
    /// [`CollectError::Api`] if a base URL is invalid.
    pub fn with_base_urls(
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
        citations_base_url: &str,
    ) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: parse_base(base_url)?,
            citations_base_url: parse_base(citations_base_url)?,
        })
    }

    /// Fetches the newest cs.AI/cs.LG/cs.CL submissions, capped at
    /// [`QUERY_CAP`].
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or
    /// [`CollectError::Xml`] on a malformed feed.
    pub async fn fetch_candidates(&self) -> Result<Vec<RawItem>, CollectError> {
        let encoded = utf8_percent_encode(SEARCH_QUERY, NON_ALPHANUMERIC).to_string();
        let url = format!(
            "{}api/query?search_query={encoded}&sortBy=submittedDate&sortOrder=descending&max_results={QUERY_CAP}",
            self.base_url
        );

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_atom_feed(&body)
    }

    /// Looks up the current citation count for a paper by its arXiv ID
    /// (without version suffix). Returns `None` when the graph has no count
    /// for the paper.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] on network failure or non-2xx status,
    /// or [`CollectError::Deserialize`] on an unexpected body shape.
    pub async fn get_citation_count(&self, arxiv_id: &str) -> Result<Option<i64>, CollectError> {
        let url = self
            .citations_base_url
            .join(&format!("graph/v1/paper/arXiv:{arxiv_id}"))
            .map_err(|e| CollectError::Api(format!("invalid paper path: {e}")))?;

        let body = self
            .client
            .get(url.clone())
            .query(&[("fields", "citationCount")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let paper: PaperResponse =
            serde_json::from_str(&body).map_err(|e| CollectError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(paper.citation_count)
    }
}

fn parse_base(base_url: &str) -> Result<Url, CollectError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised)
        .map_err(|e| CollectError::Api(format!("invalid base URL '{base_url}': {e}")))
}

/// Parses an arXiv Atom feed into [`RawItem`]s with the streaming reader.
///
/// # Errors
///
/// Returns [`CollectError::Xml`] if the XML is malformed.
pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<RawItem>, CollectError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_entry = false;
    let mut current_tag = String::new();
    let mut id = String::new();
    let mut title = String::new();
    let mut summary = String::new();
    let mut published = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut categories: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name_buf = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("").to_string();
                if name == "entry" {
                    in_entry = true;
                    id.clear();
                    title.clear();
                    summary.clear();
                    published.clear();
                    authors.clear();
                    categories.clear();
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                // <category term="cs.AI"/> elements are self-closing.
                if in_entry && e.name().as_ref() == b"category" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"term" {
                            let term = String::from_utf8_lossy(&attr.value).into_owned();
                            categories.push(term);
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name_buf = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("");
                if name == "entry" && in_entry {
                    in_entry = false;
                    if !id.is_empty() && !title.is_empty() {
                        items.push(to_raw_item(
                            &id,
                            &title,
                            &summary,
                            &published,
                            authors.clone(),
                            categories.clone(),
                        ));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_entry {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    match current_tag.as_str() {
                        "id" => id = text,
                        "title" => title = text,
                        "summary" => summary = text,
                        "published" => published = text,
                        "name" => authors.push(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CollectError::Xml(e)),
            _ => {}
        }
    }

    Ok(items)
}

fn to_raw_item(
    id: &str,
    title: &str,
    summary: &str,
    published: &str,
    authors: Vec<String>,
    categories: Vec<String>,
) -> RawItem {
    let url = id.replace("http://", "https://");
    let arxiv_id = strip_version(
        url.rsplit("/abs/")
            .next()
            .unwrap_or(&url),
    );

    let mut item = RawItem::new(SourceKind::Arxiv, collapse_whitespace(title), url);
    if !summary.is_empty() {
        item.description = Some(collapse_whitespace(summary));
    }
    item.tags = categories.clone();
    item.published_at = DateTime::parse_from_rfc3339(published)
        .ok()
        .map(|dt| dt.with_timezone(&Utc));

    item.raw.insert("arxiv_id".to_owned(), arxiv_id.into());
    if !authors.is_empty() {
        item.raw.insert("authors".to_owned(), authors.into());
    }
    if !categories.is_empty() {
        item.raw.insert("categories".to_owned(), categories.into());
    }

    item
}

/// Drops a trailing `vN` version suffix from an arXiv ID.
pub(crate) fn strip_version(id: &str) -> String {
    if let Some(pos) = id.rfind('v') {
        if pos > 0 && id[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos + 1 < id.len() {
            return id[..pos].to_owned();
        }
    }
    id.to_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
