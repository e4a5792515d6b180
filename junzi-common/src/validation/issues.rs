//! Validation issue taxonomy

use std::fmt;

use serde::{Deserialize, Serialize};

/// What went wrong with a work document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Missing or empty required field, or a value outside its grammar
    SchemaError,
    /// Duplicate chapter slug or passage ref
    UniquenessViolation,
    /// Non-monotonic ref sequence, or a gap under the dotted scheme
    OrderingViolation,
    /// Known boilerplate left in `en` without sentinel substitution
    ArtifactDetected,
    /// Split output that breaks reconstruction, or mixed ref schemes
    SplitInvariantViolation,
    /// `zh` looks like more than one sentence (non-fatal)
    SentenceHeuristicWarning,
    /// Ref's chapter number disagrees with the chapter's display number (non-fatal)
    RefChapterMismatch,
}

impl IssueKind {
    /// Fatal kinds block publication of the whole work
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            IssueKind::SentenceHeuristicWarning | IssueKind::RefChapterMismatch
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Location of an issue as `work/chapter/ref`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuePath {
    pub work: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl IssuePath {
    pub fn work(work: &str) -> Self {
        Self {
            work: work.to_string(),
            chapter: None,
            reference: None,
        }
    }

    pub fn chapter(work: &str, chapter: &str) -> Self {
        Self {
            work: work.to_string(),
            chapter: Some(chapter.to_string()),
            reference: None,
        }
    }

    pub fn passage(work: &str, chapter: &str, reference: &str) -> Self {
        Self {
            work: work.to_string(),
            chapter: Some(chapter.to_string()),
            reference: Some(reference.to_string()),
        }
    }
}

impl fmt::Display for IssuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.work)?;
        if let Some(chapter) = &self.chapter {
            write!(f, "/{}", chapter)?;
        }
        if let Some(reference) = &self.reference {
            write!(f, "/{}", reference)?;
        }
        Ok(())
    }
}

/// One finding of the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub path: IssuePath,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, path: IssuePath, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.message)
    }
}
