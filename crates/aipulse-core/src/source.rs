use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of external sources the pipeline ingests from.
///
/// Per-source behaviour (fetch, score, metadata refresh) dispatches on this
/// enum rather than on free-form source-name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Arxiv,
    Huggingface,
    Zenn,
}

#[derive(Debug, Error)]
#[error("unknown source: {0}")]
pub struct UnknownSource(pub String);

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Github,
        SourceKind::Arxiv,
        SourceKind::Huggingface,
        SourceKind::Zenn,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::Arxiv => "arxiv",
            SourceKind::Huggingface => "huggingface",
            SourceKind::Zenn => "zenn",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(SourceKind::Github),
            "arxiv" => Ok(SourceKind::Arxiv),
            "huggingface" => Ok(SourceKind::Huggingface),
            "zenn" => Ok(SourceKind::Zenn),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}
