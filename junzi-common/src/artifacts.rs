//! Scraping artifact detection and sentinel substitution

use tracing::debug;

use crate::config::ValidationConfig;
use crate::model::{Work, NO_TRANSLATION};

/// Matches `en` values against the configured artifact patterns
#[derive(Debug, Clone)]
pub struct ArtifactFilter {
    patterns: Vec<String>,
}

impl ArtifactFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(&config.artifact_patterns)
    }

    /// Pattern found in `en`, if any. The sentinel itself never matches.
    pub fn matching_pattern(&self, en: &str) -> Option<&str> {
        if en == NO_TRANSLATION {
            return None;
        }
        let lower = en.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn is_artifact(&self, en: &str) -> bool {
        self.matching_pattern(en).is_some()
    }

    /// The value to store: the sentinel for artifacts, `en` otherwise
    pub fn scrubbed<'a>(&self, en: &'a str) -> &'a str {
        if self.is_artifact(en) {
            NO_TRANSLATION
        } else {
            en
        }
    }

    /// Replace every artifact `en` in the work by the sentinel.
    /// Returns how many passages were rewritten.
    pub fn scrub_work(&self, work: &mut Work) -> usize {
        let mut replaced = 0;
        for chapter in &mut work.chapters {
            for passage in &mut chapter.passages {
                if let Some(pattern) = self.matching_pattern(&passage.en) {
                    debug!(
                        work = %work.id,
                        chapter = %chapter.slug,
                        reference = %passage.reference,
                        pattern = pattern,
                        "Replacing scraping artifact"
                    );
                    passage.en = NO_TRANSLATION.to_string();
                    replaced += 1;
                }
            }
        }
        replaced
    }
}

impl Default for ArtifactFilter {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alignment, Chapter, Passage};

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let filter = ArtifactFilter::default();
        assert!(filter.is_artifact("Enjoy this site? Please help support us"));
        assert!(filter.is_artifact("visit CTEXT.ORG for more"));
        assert!(!filter.is_artifact("The Master said, Is it not pleasant to learn?"));
    }

    #[test]
    fn test_sentinel_is_never_an_artifact() {
        let filter = ArtifactFilter::new(["translation not available"]);
        assert!(!filter.is_artifact(NO_TRANSLATION));
        assert_eq!(filter.scrubbed(NO_TRANSLATION), NO_TRANSLATION);
    }

    #[test]
    fn test_scrub_work_counts_replacements() {
        let mut work = Work {
            id: "mozi".to_string(),
            title: "墨子".to_string(),
            title_en: "Mozi".to_string(),
            source: "ctext.org".to_string(),
            ref_scheme: None,
            chapters: vec![Chapter {
                number: "1".to_string(),
                title: "Qin Shi".to_string(),
                slug: "qin-shi".to_string(),
                alignment: Alignment::Sentence,
                passages: vec![
                    Passage::new("1:1", "入國而不存其士。", "Site feedback"),
                    Passage::new("1:2", "則亡國矣。", "Then the state will perish."),
                ],
            }],
        };

        let filter = ArtifactFilter::default();
        assert_eq!(filter.scrub_work(&mut work), 1);
        assert_eq!(work.chapters[0].passages[0].en, NO_TRANSLATION);
        assert_eq!(work.chapters[0].passages[1].en, "Then the state will perish.");

        // Second pass finds nothing left to replace
        assert_eq!(filter.scrub_work(&mut work), 0);
    }
}
