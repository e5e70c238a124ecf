//! Heuristic enrichment fallback.
//!
//! When no AI backend is configured (or a call fails) the pipeline still has
//! to produce a usable short summary and tag set — an item is never dropped
//! for lack of AI output. These helpers derive both from the raw description
//! and the adapter-provided tags.

use crate::types::RawItem;

const SHORT_SUMMARY_MAX_CHARS: usize = 140;
const MAX_TAGS: usize = 8;

/// Fallback keywords scanned in title + description when the adapter
/// provided no tags of its own.
const KEYWORD_TAGS: &[&str] = &[
    "llm",
    "transformer",
    "diffusion",
    "agent",
    "rag",
    "fine-tuning",
    "inference",
    "dataset",
    "benchmark",
    "multimodal",
];

/// Derives a one-line summary from the description (first sentence, capped at
/// 140 chars), falling back to the title. Returns a non-empty string whenever
/// the item had a description or a title.
#[must_use]
pub fn heuristic_short_summary(item: &RawItem) -> String {
    let text = item
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(&item.title);

    truncate_chars(first_sentence(text), SHORT_SUMMARY_MAX_CHARS)
}

/// Best-effort tag set: adapter tags first, then keyword scan over title and
/// description, lowercased and deduplicated, capped at 8.
#[must_use]
pub fn heuristic_tags(item: &RawItem) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for tag in &item.tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() == MAX_TAGS {
            return tags;
        }
    }

    let haystack = format!(
        "{} {}",
        item.title.to_lowercase(),
        item.description.as_deref().unwrap_or("").to_lowercase()
    );
    for keyword in KEYWORD_TAGS {
        if haystack.contains(keyword) && !tags.contains(&(*keyword).to_owned()) {
            tags.push((*keyword).to_owned());
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }

    tags
}

fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    for (idx, ch) in trimmed.char_indices() {
        // Japanese full stops end a sentence without trailing whitespace.
        if ch == '。' {
            return &trimmed[..idx + ch.len_utf8()];
        }
        if matches!(ch, '.' | '!' | '?') {
            // Skip decimal points and common abbreviation dots.
            let next = trimmed[idx + ch.len_utf8()..].chars().next();
            if next.is_none() || next == Some(' ') || next == Some('\n') {
                return &trimmed[..idx + ch.len_utf8()];
            }
        }
    }
    trimmed
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}
