//! Pure quality scoring: deterministic 0-10 scores with fixed per-source
//! breakpoints, no I/O and no clock reads except recency decay for arXiv
//! (which compares against `Utc::now()` at call time).

use chrono::Utc;

use aipulse_core::SourceKind;

use crate::types::RawItem;

/// Keywords that mark a paper author list / abstract as coming from a
/// well-known lab. Case-insensitive substring match.
const PRESTIGE_KEYWORDS: &[&str] = &[
    "deepmind",
    "openai",
    "anthropic",
    "google",
    "meta ai",
    "microsoft",
    "stanford",
    "berkeley",
    "mit",
    "cmu",
    "oxford",
    "tsinghua",
];

/// Currently-hot research topics, matched against title + abstract.
const HOT_TOPICS: &[&str] = &[
    "llm",
    "language model",
    "diffusion",
    "transformer",
    "agent",
    "reinforcement",
    "multimodal",
    "retrieval",
];

/// Scores an item 0-10. Deterministic for a fixed input and clock day;
/// identical items always score identically.
#[must_use]
pub fn score(item: &RawItem) -> f64 {
    let raw = match item.source {
        SourceKind::Github => score_github(item),
        SourceKind::Arxiv => score_arxiv(item),
        SourceKind::Huggingface => score_huggingface(item),
        SourceKind::Zenn => score_zenn(item),
    };
    raw.clamp(0.0, 10.0)
}

/// Human-readable quality band for a score.
#[must_use]
pub fn quality_label(score: f64) -> &'static str {
    if score >= 8.5 {
        "excellent"
    } else if score >= 7.0 {
        "good"
    } else if score >= 5.0 {
        "medium"
    } else if score >= 3.0 {
        "fair"
    } else {
        "low"
    }
}

/// 1-5 star rating at the same thresholds as [`quality_label`].
#[must_use]
pub fn star_rating(score: f64) -> u8 {
    if score >= 8.5 {
        5
    } else if score >= 7.0 {
        4
    } else if score >= 5.0 {
        3
    } else if score >= 3.0 {
        2
    } else {
        1
    }
}

/// stars 0-3, star growth 0-2.5 (1.25 when unknown), 30-day commits 0-2.5,
/// description completeness 0-2.
fn score_github(item: &RawItem) -> f64 {
    let stars = match item.signals.stars {
        Some(s) if s >= 10_000 => 3.0,
        Some(s) if s >= 5_000 => 2.5,
        Some(s) if s >= 1_000 => 2.0,
        Some(s) if s >= 500 => 1.5,
        Some(s) if s >= 100 => 1.0,
        Some(_) => 0.5,
        None => 0.0,
    };

    let growth = match item.signals.star_growth_per_day {
        Some(g) if g >= 50.0 => 2.5,
        Some(g) if g >= 20.0 => 2.0,
        Some(g) if g >= 5.0 => 1.5,
        Some(g) if g >= 1.0 => 1.0,
        Some(_) => 0.5,
        // Unknown growth gets half credit rather than zero: an API that does
        // not expose history should not sink otherwise strong repos.
        None => 1.25,
    };

    let commits = match item.signals.commit_count_30d {
        Some(c) if c >= 100 => 2.5,
        Some(c) if c >= 50 => 2.0,
        Some(c) if c >= 20 => 1.5,
        Some(c) if c >= 5 => 1.0,
        Some(c) if c > 0 => 0.5,
        _ => 0.0,
    };

    stars + growth + commits + description_points(item, 2.0)
}

/// prestige keywords 0-3, abstract length + hot topics 0-3, completeness
/// 0-2, recency decay 0-2 (full within 7 days, zero at 90).
fn score_arxiv(item: &RawItem) -> f64 {
    let haystack = search_text(item);

    let prestige_hits = PRESTIGE_KEYWORDS
        .iter()
        .filter(|kw| haystack.contains(*kw))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let prestige = (prestige_hits as f64 * 1.5).min(3.0);

    let abstract_len = item.description.as_deref().map_or(0, str::len);
    let length_points = if abstract_len >= 1_000 {
        1.5
    } else if abstract_len >= 400 {
        1.0
    } else if abstract_len > 0 {
        0.5
    } else {
        0.0
    };
    let topic_hits = HOT_TOPICS.iter().filter(|kw| haystack.contains(*kw)).count();
    #[allow(clippy::cast_precision_loss)]
    let substance = (length_points + topic_hits as f64 * 0.5).min(3.0);

    let mut completeness = 0.0;
    if item.title.len() >= 10 {
        completeness += 1.0;
    }
    if abstract_len > 0 {
        completeness += 1.0;
    }

    let recency = item.published_at.map_or(0.0, |published| {
        let age_days = (Utc::now() - published).num_days();
        if age_days <= 7 {
            2.0
        } else if age_days >= 90 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let fraction = (90 - age_days) as f64 / 83.0;
            2.0 * fraction
        }
    });

    prestige + substance + completeness + recency
}

/// downloads 0-3, download growth 0-2.5 (1.25 when unknown), description
/// 0-2.5, likes 0-2.
fn score_huggingface(item: &RawItem) -> f64 {
    let downloads = match item.signals.downloads {
        Some(d) if d >= 1_000_000 => 3.0,
        Some(d) if d >= 100_000 => 2.5,
        Some(d) if d >= 10_000 => 2.0,
        Some(d) if d >= 1_000 => 1.5,
        Some(d) if d >= 100 => 1.0,
        Some(_) => 0.5,
        None => 0.0,
    };

    let growth = match item.signals.download_growth_per_day {
        Some(g) if g >= 10_000.0 => 2.5,
        Some(g) if g >= 1_000.0 => 2.0,
        Some(g) if g >= 100.0 => 1.5,
        Some(g) if g >= 10.0 => 1.0,
        Some(_) => 0.5,
        None => 1.25,
    };

    let likes = match item.signals.likes {
        Some(l) if l >= 1_000 => 2.0,
        Some(l) if l >= 100 => 1.5,
        Some(l) if l >= 10 => 1.0,
        Some(l) if l > 0 => 0.5,
        _ => 0.0,
    };

    downloads + growth + description_points(item, 2.5) + likes
}

/// likes 0-3, comments 0-2, premium bonus 0-3, body length 0-2.
fn score_zenn(item: &RawItem) -> f64 {
    let likes = match item.signals.likes {
        Some(l) if l >= 500 => 3.0,
        Some(l) if l >= 100 => 2.5,
        Some(l) if l >= 50 => 2.0,
        Some(l) if l >= 20 => 1.5,
        Some(l) if l >= 10 => 1.0,
        Some(l) if l > 0 => 0.5,
        _ => 0.0,
    };

    let comments = match item.signals.comment_count {
        Some(c) if c >= 20 => 2.0,
        Some(c) if c >= 5 => 1.5,
        Some(c) if c >= 1 => 1.0,
        _ => 0.0,
    };

    let premium = if item.signals.is_premium == Some(true) {
        3.0
    } else {
        0.0
    };

    // Body length comes from the API's letter count; descriptions are not
    // part of the Zenn listing payload.
    let body_letters = item
        .raw
        .get("body_letters_count")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);
    let body = if body_letters >= 5_000 {
        2.0
    } else if body_letters >= 2_000 {
        1.5
    } else if body_letters >= 500 {
        1.0
    } else if body_letters > 0 {
        0.5
    } else {
        0.0
    };

    likes + comments + premium + body
}

fn description_points(item: &RawItem, max: f64) -> f64 {
    let len = item.description.as_deref().map_or(0, str::len);
    if len >= 200 {
        max
    } else if len >= 80 {
        max * 0.75
    } else if len >= 20 {
        max * 0.5
    } else if len > 0 {
        max * 0.25
    } else {
        0.0
    }
}

fn search_text(item: &RawItem) -> String {
    let mut text = item.title.to_lowercase();
    if let Some(description) = &item.description {
        text.push(' ');
        text.push_str(&description.to_lowercase());
    }
    if let Some(authors) = item.raw.get("authors").and_then(serde_json::Value::as_array) {
        for author in authors {
            if let Some(name) = author.as_str() {
                text.push(' ');
                text.push_str(&name.to_lowercase());
            }
        }
    }
    text
}
