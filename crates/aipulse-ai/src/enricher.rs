use aipulse_core::SourceKind;

use crate::error::AiError;

/// Text enrichment backend for collected items.
///
/// The collector is generic over this trait so that tests can substitute a
/// stub and the pipeline can degrade gracefully when no backend is
/// configured. Implementations must be cheap to call when unavailable:
/// callers check [`TextEnricher::is_available`] before issuing requests.
#[allow(async_fn_in_trait)]
pub trait TextEnricher: Send + Sync {
    /// Whether the backend is configured and worth calling.
    fn is_available(&self) -> bool;

    /// Produces a 3-5 sentence summary of `text`, phrased for the given
    /// source kind (a paper abstract reads differently from a repo README).
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Unavailable`] when the backend is not configured,
    /// or an HTTP/API error from the underlying request.
    async fn summarize(
        &self,
        text: &str,
        source: SourceKind,
        lang: &str,
    ) -> Result<String, AiError>;

    /// Produces a single-sentence summary suitable for a list view.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TextEnricher::summarize`].
    async fn short_summarize(&self, text: &str, lang: &str) -> Result<String, AiError>;

    /// Extracts 5-8 short topical tags from `text`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TextEnricher::summarize`].
    async fn extract_tags(&self, text: &str, lang: &str) -> Result<Vec<String>, AiError>;

    /// Suggests a concrete first step for trying the resource out. `tags`
    /// give the model topical context alongside the raw text.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TextEnricher::summarize`].
    async fn suggest_trial(
        &self,
        text: &str,
        tags: &[String],
        lang: &str,
    ) -> Result<String, AiError>;
}
