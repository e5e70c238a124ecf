use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::source::SourceKind;
use crate::ConfigError;

/// Per-source collection settings: the enable switch and the minimum-signal
/// threshold applied as a hard pre-filter before quality scoring.
///
/// Only the threshold relevant to a source is consulted (`min_stars` for
/// GitHub, `min_downloads` for Hugging Face, `min_likes` for Zenn,
/// `min_citations` for arXiv); the others are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub min_stars: i64,
    #[serde(default)]
    pub min_downloads: i64,
    #[serde(default)]
    pub min_likes: i64,
    #[serde(default)]
    pub min_citations: i64,
}

fn default_enabled() -> bool {
    true
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_stars: 0,
            min_downloads: 0,
            min_likes: 0,
            min_citations: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: BTreeMap<String, SourceSettings>,
}

/// Validated per-source settings map. Sources absent from the file fall back
/// to [`SourceSettings::default`] (enabled, zero thresholds).
#[derive(Debug, Clone, Default)]
pub struct SourcesConfig {
    settings: BTreeMap<SourceKind, SourceSettings>,
}

impl SourcesConfig {
    #[must_use]
    pub fn get(&self, kind: SourceKind) -> SourceSettings {
        self.settings.get(&kind).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, kind: SourceKind, settings: SourceSettings) {
        self.settings.insert(kind, settings);
    }

    /// Sources that are currently enabled, in stable order.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).enabled)
            .collect()
    }
}

/// Load and validate the per-source settings from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or names a
/// source outside the known set.
pub fn load_sources(path: &Path) -> Result<SourcesConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

fn parse_sources(content: &str) -> Result<SourcesConfig, ConfigError> {
    let file: SourcesFile = serde_yaml::from_str(content)?;

    let mut settings = BTreeMap::new();
    for (name, source_settings) in file.sources {
        let kind = SourceKind::from_str(&name)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if source_settings.min_stars < 0
            || source_settings.min_downloads < 0
            || source_settings.min_likes < 0
            || source_settings.min_citations < 0
        {
            return Err(ConfigError::Validation(format!(
                "thresholds for source '{name}' must be non-negative"
            )));
        }
        settings.insert(kind, source_settings);
    }

    Ok(SourcesConfig { settings })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
sources:
  github:
    enabled: true
    min_stars: 100
  arxiv:
    enabled: true
  huggingface:
    enabled: true
    min_downloads: 500
  zenn:
    enabled: false
    min_likes: 10
";

    #[test]
    fn parses_sample_file() {
        let config = parse_sources(SAMPLE).expect("sample should parse");
        assert_eq!(config.get(SourceKind::Github).min_stars, 100);
        assert_eq!(config.get(SourceKind::Huggingface).min_downloads, 500);
        assert!(!config.get(SourceKind::Zenn).enabled);
        assert!(config.get(SourceKind::Arxiv).enabled);
    }

    #[test]
    fn enabled_sources_excludes_disabled() {
        let config = parse_sources(SAMPLE).expect("sample should parse");
        let enabled = config.enabled_sources();
        assert_eq!(
            enabled,
            vec![SourceKind::Github, SourceKind::Arxiv, SourceKind::Huggingface]
        );
    }

    #[test]
    fn missing_source_falls_back_to_default() {
        let config = parse_sources("sources:\n  github:\n    min_stars: 50\n").expect("parse");
        let zenn = config.get(SourceKind::Zenn);
        assert!(zenn.enabled);
        assert_eq!(zenn.min_likes, 0);
    }

    #[test]
    fn unknown_source_name_is_rejected() {
        let result = parse_sources("sources:\n  reddit:\n    enabled: true\n");
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("reddit")),
            "expected validation error, got: {result:?}"
        );
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let result = parse_sources("sources:\n  github:\n    min_stars: -5\n");
        assert!(
            matches!(result, Err(ConfigError::Validation(_))),
            "expected validation error, got: {result:?}"
        );
    }

    #[test]
    fn enabled_defaults_to_true_when_omitted() {
        let config = parse_sources("sources:\n  github:\n    min_stars: 1\n").expect("parse");
        assert!(config.get(SourceKind::Github).enabled);
    }
}
