//! Passage store data model
//!
//! A [`Work`] owns its [`Chapter`]s and a chapter owns its [`Passage`]s. The
//! tree is serialized verbatim as one JSON document per work, using the
//! camelCase field names the reader front end consumes (`titleEn`, `ref`).
//!
//! # Invariants
//! - `Work::id` is immutable once published (serving layer and bookmarks key on it).
//! - `Chapter::slug` is unique within its work; `Chapter::number` is display only.
//! - Passage order within a chapter is reading order and is never reshuffled.

use serde::{Deserialize, Serialize};

use crate::refs::RefScheme;

/// Literal stored in `en` when no usable translation exists
pub const NO_TRANSLATION: &str = "[Translation not available]";

/// One classical text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    /// Stable lowercase slug, unique across the store
    #[serde(default)]
    pub id: String,
    /// Native-script title
    #[serde(default)]
    pub title: String,
    /// English title
    #[serde(default)]
    pub title_en: String,
    /// Attribution string
    #[serde(default)]
    pub source: String,
    /// Declared reference numbering scheme; inferred from the refs when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_scheme: Option<RefScheme>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Work {
    pub fn chapter(&self, slug: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|ch| ch.slug == slug)
    }

    pub fn chapter_mut(&mut self, slug: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|ch| ch.slug == slug)
    }

    /// Total passages across all chapters
    pub fn passage_count(&self) -> usize {
        self.chapters.iter().map(|ch| ch.passages.len()).sum()
    }

    /// Declared scheme, or the one implied by the refs already present
    pub fn effective_scheme(&self) -> RefScheme {
        self.ref_scheme.unwrap_or_else(|| {
            RefScheme::infer(
                self.chapters
                    .iter()
                    .flat_map(|ch| ch.passages.iter())
                    .map(|p| p.reference.as_str()),
            )
        })
    }
}

/// Granularity of a chapter's passages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// One passage per source sentence or clause
    #[default]
    Sentence,
    /// Scraped paragraph blobs, not yet split
    Paragraph,
}

impl Alignment {
    fn is_sentence(&self) -> bool {
        *self == Alignment::Sentence
    }
}

/// A named subdivision of a work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Display label; may be a roman numeral or section name
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub title: String,
    /// URL-safe identifier, unique within the work
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Alignment::is_sentence")]
    pub alignment: Alignment,
    #[serde(default)]
    pub passages: Vec<Passage>,
}

impl Chapter {
    pub fn passage(&self, reference: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.reference == reference)
    }

    pub fn is_paragraph_level(&self) -> bool {
        self.alignment == Alignment::Paragraph
    }
}

/// Atomic aligned unit: one source sentence and its English rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub zh: String,
    #[serde(default)]
    pub en: String,
}

impl Passage {
    pub fn new(reference: impl Into<String>, zh: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            zh: zh.into(),
            en: en.into(),
        }
    }

    pub fn has_translation(&self) -> bool {
        !self.en.trim().is_empty() && self.en != NO_TRANSLATION
    }
}

/// Single-chapter document produced while a work is split chunk by chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDocument {
    pub id: String,
    pub title: String,
    pub title_en: String,
    pub source: String,
    /// The work's declared scheme, carried so chunks split the same way
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_scheme: Option<RefScheme>,
    pub chapter: Chapter,
}

impl ChunkDocument {
    /// Declared scheme, or the one implied by this chapter's refs
    pub fn effective_scheme(&self) -> RefScheme {
        self.ref_scheme.unwrap_or_else(|| {
            RefScheme::infer(self.chapter.passages.iter().map(|p| p.reference.as_str()))
        })
    }
}
