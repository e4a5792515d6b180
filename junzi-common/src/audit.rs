//! Translation audit
//!
//! Finds chapters whose English side is mostly missing, boilerplate or
//! untranslated source text, so they can be dropped and re-ingested.
//! Auditing is read-only; [`TranslationAuditor::prune_flagged`] is the
//! explicit repair.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactFilter;
use crate::config::ValidationConfig;
use crate::model::{Chapter, Work, NO_TRANSLATION};
use crate::text::is_cjk;

/// Chapter flagged by an audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadChapter {
    pub number: String,
    pub slug: String,
    pub title: String,
    pub bad_passages: usize,
    pub total_passages: usize,
}

/// Audit findings for one work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub work_id: String,
    pub title_en: String,
    pub total_chapters: usize,
    pub total_passages: usize,
    /// Bad passages across all chapters, flagged or not
    pub bad_passages: usize,
    pub bad_chapters: Vec<BadChapter>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.bad_chapters.is_empty()
    }
}

pub struct TranslationAuditor {
    artifacts: ArtifactFilter,
    min_chars: usize,
    max_cjk_ratio: f64,
    bad_chapter_ratio: f64,
}

impl TranslationAuditor {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            artifacts: ArtifactFilter::from_config(config),
            min_chars: config.min_translation_chars,
            max_cjk_ratio: config.max_cjk_ratio,
            bad_chapter_ratio: config.bad_chapter_ratio,
        }
    }

    /// True when `en` is not a usable translation
    pub fn is_bad_translation(&self, en: &str) -> bool {
        if en == NO_TRANSLATION || en.trim().chars().count() < self.min_chars {
            return true;
        }
        if self.artifacts.is_artifact(en) {
            return true;
        }

        let total = en.chars().count();
        let cjk = en.chars().filter(|c| is_cjk(*c)).count();
        cjk as f64 / total as f64 > self.max_cjk_ratio
    }

    fn audit_chapter(&self, chapter: &Chapter) -> (usize, bool) {
        let bad = chapter
            .passages
            .iter()
            .filter(|p| self.is_bad_translation(&p.en))
            .count();
        let total = chapter.passages.len();
        let flagged = total > 0 && bad as f64 / total as f64 > self.bad_chapter_ratio;
        (bad, flagged)
    }

    pub fn audit_work(&self, work: &Work) -> AuditReport {
        let mut report = AuditReport {
            work_id: work.id.clone(),
            title_en: work.title_en.clone(),
            total_chapters: work.chapters.len(),
            ..Default::default()
        };

        for chapter in &work.chapters {
            let (bad, flagged) = self.audit_chapter(chapter);
            report.total_passages += chapter.passages.len();
            report.bad_passages += bad;
            if flagged {
                warn!(
                    work = %work.id,
                    chapter = %chapter.slug,
                    bad,
                    total = chapter.passages.len(),
                    "Chapter flagged: translation mostly missing"
                );
                report.bad_chapters.push(BadChapter {
                    number: chapter.number.clone(),
                    slug: chapter.slug.clone(),
                    title: chapter.title.clone(),
                    bad_passages: bad,
                    total_passages: chapter.passages.len(),
                });
            } else if bad > 0 {
                debug!(work = %work.id, chapter = %chapter.slug, bad, "Some bad passages");
            }
        }

        info!(
            work = %work.id,
            chapters = report.total_chapters,
            flagged = report.bad_chapters.len(),
            bad_passages = report.bad_passages,
            "Audit complete"
        );
        report
    }

    /// Remove the flagged chapters from `work`; returns what was removed
    pub fn prune_flagged(&self, work: &mut Work) -> Vec<BadChapter> {
        let report = self.audit_work(work);
        if report.bad_chapters.is_empty() {
            return report.bad_chapters;
        }
        work.chapters
            .retain(|ch| !report.bad_chapters.iter().any(|bad| bad.slug == ch.slug));
        info!(
            work = %work.id,
            removed = report.bad_chapters.len(),
            "Flagged chapters removed for re-ingestion"
        );
        report.bad_chapters
    }
}

impl Default for TranslationAuditor {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}
