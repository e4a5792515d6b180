//! Passage validator
//!
//! Certifies a candidate [`Work`] before it is published to the store.
//! Validation is all-or-nothing per work: any fatal issue rejects the whole
//! document. The validator only reports; repairs (artifact scrubbing,
//! splitting) are explicit transforms run beforehand.
//!
//! # Checks
//! 1. **Work fields**: `id`, `title`, `titleEn`, `source` non-empty; `id` a lowercase slug
//! 2. **Chapter slugs**: non-empty, URL-safe, unique within the work
//! 3. **Passage refs**: parse under the ref grammar, unique within the chapter
//! 4. **Text fields**: `zh` and `en` non-empty; no artifact left in `en`
//! 5. **Ordering**: refs strictly increasing; no passage-number gaps under the dotted scheme
//! 6. **Scheme**: one numbering scheme per chapter
//! 7. **Heuristics** (warnings): single-sentence `zh`, ref chapter number cross-check

mod issues;

pub use issues::{IssueKind, IssuePath, ValidationIssue};

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactFilter;
use crate::config::ValidationConfig;
use crate::model::{Chapter, Work};
use crate::refs::{PassageRef, RefScheme};
use crate::text::single_sentence_problem;
use crate::{Error, Result};

static WORK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").expect("static regex"));

static URL_SAFE_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._~-]+$").expect("static regex"));

/// True for ids usable as store keys and file stems
pub fn is_valid_work_id(id: &str) -> bool {
    WORK_ID.is_match(id)
}

pub fn is_url_safe_slug(slug: &str) -> bool {
    URL_SAFE_SLUG.is_match(slug)
}

/// Everything the validator found in one work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub work_id: String,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn new(work_id: &str) -> Self {
        Self {
            work_id: work_id.to_string(),
            ..Default::default()
        }
    }

    fn push(&mut self, issue: ValidationIssue) {
        if issue.is_fatal() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|i| i.kind == kind)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} error(s), {} warning(s)",
            self.work_id,
            self.errors.len(),
            self.warnings.len()
        )?;
        if let Some(first) = self.errors.first() {
            write!(f, "; first error {}", first)?;
        }
        Ok(())
    }
}

/// Validation result: a certified work or the reasons it was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted {
        work: Work,
        warnings: Vec<ValidationIssue>,
    },
    Rejected(ValidationReport),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted { .. })
    }

    /// Accepted work and its warnings, or `Error::Validation`
    pub fn into_result(self) -> Result<(Work, Vec<ValidationIssue>)> {
        match self {
            ValidationOutcome::Accepted { work, warnings } => Ok((work, warnings)),
            ValidationOutcome::Rejected(report) => Err(Error::Validation(report)),
        }
    }
}

/// Work document validator
pub struct Validator {
    artifacts: ArtifactFilter,
}

impl Validator {
    pub fn new(artifacts: ArtifactFilter) -> Self {
        Self { artifacts }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(ArtifactFilter::from_config(config))
    }

    /// Certify a work, handing it back only when no fatal issue exists
    pub fn validate(&self, work: Work) -> ValidationOutcome {
        let report = self.check(&work);
        if report.is_accepted() {
            ValidationOutcome::Accepted {
                work,
                warnings: report.warnings,
            }
        } else {
            ValidationOutcome::Rejected(report)
        }
    }

    /// Run every check and collect the findings
    pub fn check(&self, work: &Work) -> ValidationReport {
        let mut report = ValidationReport::new(&work.id);
        let scheme = work.effective_scheme();

        self.check_work_fields(work, &mut report);

        let mut slugs = HashSet::new();
        for chapter in &work.chapters {
            let chapter_path = IssuePath::chapter(&work.id, &chapter.slug);
            if chapter.slug.trim().is_empty() {
                report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    chapter_path.clone(),
                    format!("chapter '{}' has an empty slug", chapter.number),
                ));
            } else if !is_url_safe_slug(&chapter.slug) {
                report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    chapter_path.clone(),
                    "slug contains characters that are not URL-safe",
                ));
            }
            if !chapter.slug.is_empty() && !slugs.insert(chapter.slug.as_str()) {
                report.push(ValidationIssue::new(
                    IssueKind::UniquenessViolation,
                    chapter_path,
                    "duplicate chapter slug",
                ));
            }

            self.check_chapter(work, chapter, scheme, &mut report);
        }

        if report.is_accepted() {
            info!(
                work = %work.id,
                chapters = work.chapters.len(),
                passages = work.passage_count(),
                warnings = report.warnings.len(),
                "Work accepted"
            );
        } else {
            warn!(
                work = %work.id,
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Work rejected"
            );
        }
        report
    }

    fn check_work_fields(&self, work: &Work, report: &mut ValidationReport) {
        let path = IssuePath::work(&work.id);
        for (name, value) in [
            ("id", &work.id),
            ("title", &work.title),
            ("titleEn", &work.title_en),
            ("source", &work.source),
        ] {
            if value.trim().is_empty() {
                report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    path.clone(),
                    format!("work field '{}' is missing or empty", name),
                ));
            }
        }
        if !work.id.trim().is_empty() && !is_valid_work_id(&work.id) {
            report.push(ValidationIssue::new(
                IssueKind::SchemaError,
                path,
                format!("work id '{}' is not a lowercase slug", work.id),
            ));
        }
    }

    fn check_chapter(
        &self,
        work: &Work,
        chapter: &Chapter,
        scheme: RefScheme,
        report: &mut ValidationReport,
    ) {
        let mut seen_refs = HashSet::new();
        let mut parsed: Vec<(usize, PassageRef)> = Vec::with_capacity(chapter.passages.len());

        for (index, passage) in chapter.passages.iter().enumerate() {
            let path = IssuePath::passage(&work.id, &chapter.slug, &passage.reference);

            let duplicate = !seen_refs.insert(passage.reference.as_str());
            if duplicate {
                report.push(ValidationIssue::new(
                    IssueKind::UniquenessViolation,
                    path.clone(),
                    "duplicate passage ref",
                ));
            }

            match passage.reference.parse::<PassageRef>() {
                Ok(r) => {
                    if let Some(ref_chapter) = &r.chapter {
                        if *ref_chapter != chapter.number {
                            report.push(ValidationIssue::new(
                                IssueKind::RefChapterMismatch,
                                path.clone(),
                                format!(
                                    "ref chapter '{}' differs from chapter number '{}'",
                                    ref_chapter, chapter.number
                                ),
                            ));
                        }
                    }
                    if !duplicate {
                        parsed.push((index, r));
                    }
                }
                Err(e) => report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    path.clone(),
                    e.to_string(),
                )),
            }

            if passage.zh.trim().is_empty() {
                report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    path.clone(),
                    "zh is empty",
                ));
            } else if !chapter.is_paragraph_level() {
                if let Some(problem) = single_sentence_problem(&passage.zh) {
                    report.push(ValidationIssue::new(
                        IssueKind::SentenceHeuristicWarning,
                        path.clone(),
                        problem,
                    ));
                }
            }

            if passage.en.trim().is_empty() {
                report.push(ValidationIssue::new(
                    IssueKind::SchemaError,
                    path.clone(),
                    "en is empty",
                ));
            } else if let Some(pattern) = self.artifacts.matching_pattern(&passage.en) {
                report.push(ValidationIssue::new(
                    IssueKind::ArtifactDetected,
                    path,
                    format!("en contains scraping artifact '{}'", pattern),
                ));
            }
        }

        check_ordering(work, chapter, &parsed, scheme, report);
        check_scheme(work, chapter, &parsed, scheme, report);

        debug!(
            work = %work.id,
            chapter = %chapter.slug,
            passages = chapter.passages.len(),
            "Chapter checked"
        );
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ArtifactFilter::default())
    }
}

fn passage_path(work: &Work, chapter: &Chapter, index: usize) -> IssuePath {
    IssuePath::passage(&work.id, &chapter.slug, &chapter.passages[index].reference)
}

fn check_ordering(
    work: &Work,
    chapter: &Chapter,
    parsed: &[(usize, PassageRef)],
    scheme: RefScheme,
    report: &mut ValidationReport,
) {
    for pair in parsed.windows(2) {
        let (_, prev) = &pair[0];
        let (index, current) = &pair[1];
        if current.sort_key() <= prev.sort_key() {
            report.push(ValidationIssue::new(
                IssueKind::OrderingViolation,
                passage_path(work, chapter, *index),
                format!("ref does not follow '{}' in reading order", prev),
            ));
        } else if scheme == RefScheme::Dotted
            && prev.passage.checked_add(1).is_some_and(|next| current.passage > next)
        {
            report.push(ValidationIssue::new(
                IssueKind::OrderingViolation,
                passage_path(work, chapter, *index),
                format!(
                    "passage number gap: {} follows {}",
                    current.passage, prev.passage
                ),
            ));
        }
    }
}

fn check_scheme(
    work: &Work,
    chapter: &Chapter,
    parsed: &[(usize, PassageRef)],
    scheme: RefScheme,
    report: &mut ValidationReport,
) {
    match scheme {
        RefScheme::Shift => {
            for (index, r) in parsed.iter().filter(|(_, r)| r.is_dotted()) {
                report.push(ValidationIssue::new(
                    IssueKind::SplitInvariantViolation,
                    passage_path(work, chapter, *index),
                    format!("scheme mismatch: dotted ref '{}' in a shift-scheme work", r),
                ));
            }
        }
        RefScheme::Dotted => {
            let bare: HashSet<u32> = parsed
                .iter()
                .filter(|(_, r)| !r.is_dotted())
                .map(|(_, r)| r.passage)
                .collect();
            for (index, r) in parsed.iter().filter(|(_, r)| r.is_dotted()) {
                if bare.contains(&r.passage) {
                    report.push(ValidationIssue::new(
                        IssueKind::SplitInvariantViolation,
                        passage_path(work, chapter, *index),
                        format!(
                            "scheme mismatch: passage {} appears both bare and dotted",
                            r.passage
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alignment, Passage, NO_TRANSLATION};

    fn work_with(passages: Vec<Passage>) -> Work {
        Work {
            id: "shiji".to_string(),
            title: "史記".to_string(),
            title_en: "Records of the Grand Historian".to_string(),
            source: "ctext.org".to_string(),
            ref_scheme: None,
            chapters: vec![Chapter {
                number: "1".to_string(),
                title: "Wu Di Ben Ji".to_string(),
                slug: "wu-di-ben-ji".to_string(),
                alignment: Alignment::Sentence,
                passages,
            }],
        }
    }

    fn kinds(report: &ValidationReport) -> Vec<IssueKind> {
        report.errors.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_clean_work_is_accepted() {
        let work = work_with(vec![
            Passage::new("1:1", "黃帝者，少典之子，姓公孫，名曰軒轅。", "Huangdi was the son of Shaodian."),
            Passage::new("1:2", "生而神靈，弱而能言。", "Born with spiritual powers, he could talk when quite young."),
        ]);

        let outcome = Validator::default().validate(work.clone());
        match outcome {
            ValidationOutcome::Accepted { work: accepted, warnings } => {
                assert_eq!(accepted, work);
                assert!(warnings.is_empty());
            }
            ValidationOutcome::Rejected(report) => panic!("unexpected rejection: {}", report),
        }
    }

    #[test]
    fn test_missing_work_fields() {
        let mut work = work_with(vec![]);
        work.title_en.clear();
        work.source = "  ".to_string();

        let report = Validator::default().check(&work);
        assert_eq!(
            kinds(&report),
            vec![IssueKind::SchemaError, IssueKind::SchemaError]
        );
        assert!(report.errors[0].message.contains("titleEn"));
    }

    #[test]
    fn test_uppercase_work_id_rejected() {
        let mut work = work_with(vec![]);
        work.id = "ShiJi".to_string();
        let report = Validator::default().check(&work);
        assert!(report.has_kind(IssueKind::SchemaError));
    }

    #[test]
    fn test_duplicate_and_unsafe_slugs() {
        let mut work = work_with(vec![]);
        let mut twin = work.chapters[0].clone();
        twin.number = "2".to_string();
        work.chapters.push(twin);
        let mut spaced = work.chapters[0].clone();
        spaced.slug = "wu di".to_string();
        work.chapters.push(spaced);

        let report = Validator::default().check(&work);
        assert!(report
            .errors
            .iter()
            .any(|i| i.kind == IssueKind::UniquenessViolation
                && i.path.to_string() == "shiji/wu-di-ben-ji"));
        assert!(report
            .errors
            .iter()
            .any(|i| i.kind == IssueKind::SchemaError && i.path.to_string() == "shiji/wu di"));
    }

    #[test]
    fn test_duplicate_ref_reported_once() {
        let work = work_with(vec![
            Passage::new("1:1", "甲。", "First sentence here."),
            Passage::new("1:1", "乙。", "Second sentence here."),
        ]);
        let report = Validator::default().check(&work);
        assert_eq!(kinds(&report), vec![IssueKind::UniquenessViolation]);
        assert_eq!(report.errors[0].path.to_string(), "shiji/wu-di-ben-ji/1:1");
    }

    #[test]
    fn test_out_of_order_refs() {
        let work = work_with(vec![
            Passage::new("1:2", "甲。", "First sentence here."),
            Passage::new("1:1", "乙。", "Second sentence here."),
        ]);
        let report = Validator::default().check(&work);
        assert_eq!(kinds(&report), vec![IssueKind::OrderingViolation]);
    }

    #[test]
    fn test_unparseable_ref_is_schema_error() {
        let work = work_with(vec![Passage::new("1:x", "甲。", "First sentence here.")]);
        let report = Validator::default().check(&work);
        assert_eq!(kinds(&report), vec![IssueKind::SchemaError]);
    }

    #[test]
    fn test_artifact_requires_sentinel() {
        let bad = work_with(vec![Passage::new("1:1", "甲。", "Enjoy this site? Please help.")]);
        let report = Validator::default().check(&bad);
        assert_eq!(kinds(&report), vec![IssueKind::ArtifactDetected]);

        let fixed = work_with(vec![Passage::new("1:1", "甲。", NO_TRANSLATION)]);
        assert!(Validator::default().check(&fixed).is_accepted());
    }

    #[test]
    fn test_empty_text_fields() {
        let work = work_with(vec![Passage::new("1:1", " ", "")]);
        let report = Validator::default().check(&work);
        assert_eq!(
            kinds(&report),
            vec![IssueKind::SchemaError, IssueKind::SchemaError]
        );
    }

    #[test]
    fn test_run_on_paragraph_only_warns() {
        let work = work_with(vec![Passage::new(
            "1:1",
            "黃帝者，少典之子。生而神靈，弱而能言。",
            "Huangdi was the son of Shaodian. Born with spiritual powers.",
        )]);
        let outcome = Validator::default().validate(work);
        match outcome {
            ValidationOutcome::Accepted { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert_eq!(warnings[0].kind, IssueKind::SentenceHeuristicWarning);
            }
            ValidationOutcome::Rejected(report) => panic!("unexpected rejection: {}", report),
        }
    }

    #[test]
    fn test_paragraph_chapter_skips_sentence_heuristic() {
        let mut work = work_with(vec![Passage::new(
            "1:1",
            "黃帝者，少典之子。生而神靈，弱而能言。",
            "Huangdi was the son of Shaodian. Born with spiritual powers.",
        )]);
        work.chapters[0].alignment = Alignment::Paragraph;
        let report = Validator::default().check(&work);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_mixed_schemes_in_one_chapter() {
        let work = work_with(vec![
            Passage::new("1:1", "甲。", "First sentence here."),
            Passage::new("1:2", "乙。", "Second sentence here."),
            Passage::new("1:2.1", "丙。", "Third sentence here."),
        ]);
        let report = Validator::default().check(&work);
        assert!(!report.is_accepted());
        assert!(report.has_kind(IssueKind::SplitInvariantViolation));
        assert!(report.errors[0].message.contains("scheme mismatch"));
    }

    #[test]
    fn test_declared_shift_rejects_dotted_refs() {
        let mut work = work_with(vec![
            Passage::new("1:1.1", "甲。", "First sentence here."),
            Passage::new("1:1.2", "乙。", "Second sentence here."),
        ]);
        work.ref_scheme = Some(RefScheme::Shift);
        let report = Validator::default().check(&work);
        assert_eq!(
            kinds(&report),
            vec![
                IssueKind::SplitInvariantViolation,
                IssueKind::SplitInvariantViolation
            ]
        );
    }

    #[test]
    fn test_dotted_scheme_gap_is_ordering_violation() {
        let work = work_with(vec![
            Passage::new("1:1.1", "甲。", "First sentence here."),
            Passage::new("1:1.2", "乙。", "Second sentence here."),
            Passage::new("1:3", "丙。", "Third sentence here."),
        ]);
        let report = Validator::default().check(&work);
        assert_eq!(kinds(&report), vec![IssueKind::OrderingViolation]);
    }

    #[test]
    fn test_dotted_refs_at_largest_passage_number() {
        let work = work_with(vec![
            Passage::new("1:4294967295.1", "甲。", "First sentence here."),
            Passage::new("1:4294967295.2", "乙。", "Second sentence here."),
        ]);
        let report = Validator::default().check(&work);
        assert!(!kinds(&report).contains(&IssueKind::OrderingViolation));
    }

    #[test]
    fn test_ref_chapter_mismatch_warns() {
        let work = work_with(vec![Passage::new("2:1", "甲。", "First sentence here.")]);
        let report = Validator::default().check(&work);
        assert!(report.is_accepted());
        assert_eq!(report.warnings[0].kind, IssueKind::RefChapterMismatch);
    }

    #[test]
    fn test_into_result_maps_rejection() {
        let work = work_with(vec![Passage::new("1:1", "甲。", "")]);
        let err = Validator::default().validate(work).into_result().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
