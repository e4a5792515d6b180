//! Passage reference strings and their ordering
//!
//! Grammar: `chapter-number ":" passage-number ["." sentence-number]`.
//! Works scraped as a single page carry bare `passage-number` refs.
//!
//! Two renumbering schemes exist for split paragraphs:
//! - **Shift**: `7:3` split in three becomes `7:3`, `7:4`, `7:5`; later
//!   passages move up by two.
//! - **Dotted**: `7:3` split in three becomes `7:3.1`, `7:3.2`, `7:3.3`;
//!   later passages keep their numbers.
//!
//! A work uses one scheme throughout; shift is the canonical default.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reference numbering scheme for split passages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefScheme {
    /// Split parts become sibling passage numbers; later passages shift up
    #[default]
    Shift,
    /// Split parts get a sentence suffix; later passages are untouched
    Dotted,
}

impl RefScheme {
    /// Dotted if any parseable ref carries a sentence number, shift otherwise
    pub fn infer<'a>(refs: impl IntoIterator<Item = &'a str>) -> Self {
        let dotted = refs
            .into_iter()
            .filter_map(|r| r.parse::<PassageRef>().ok())
            .any(|r| r.sentence.is_some());
        if dotted {
            RefScheme::Dotted
        } else {
            RefScheme::Shift
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefScheme::Shift => "shift",
            RefScheme::Dotted => "dotted",
        }
    }
}

impl fmt::Display for RefScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shift" => Ok(RefScheme::Shift),
            "dotted" => Ok(RefScheme::Dotted),
            other => Err(format!("unknown ref scheme '{}' (expected shift or dotted)", other)),
        }
    }
}

/// Parsed passage reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PassageRef {
    /// Echo of the chapter's display number; absent on single-page works
    pub chapter: Option<String>,
    pub passage: u32,
    pub sentence: Option<u32>,
}

impl PassageRef {
    pub fn new(chapter: Option<&str>, passage: u32, sentence: Option<u32>) -> Self {
        Self {
            chapter: chapter.map(str::to_string),
            passage,
            sentence,
        }
    }

    /// Ordering key within a chapter: passage number, then sentence number
    /// with an absent sentence number sorting first
    pub fn sort_key(&self) -> (u32, Option<u32>) {
        (self.passage, self.sentence)
    }

    /// Compare two refs of the same chapter by reading order
    pub fn reading_order(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }

    pub fn is_dotted(&self) -> bool {
        self.sentence.is_some()
    }

    pub fn with_passage(&self, passage: u32) -> Self {
        Self {
            chapter: self.chapter.clone(),
            passage,
            sentence: self.sentence,
        }
    }

    pub fn with_sentence(&self, sentence: Option<u32>) -> Self {
        Self {
            chapter: self.chapter.clone(),
            passage: self.passage,
            sentence,
        }
    }
}

fn parse_positive(field: &str, raw: &str, whole: &str) -> Result<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!(
            "ref '{}': {} '{}' is not a positive integer",
            whole, field, raw
        )));
    }
    match raw.parse::<u32>() {
        Ok(0) | Err(_) => Err(Error::InvalidInput(format!(
            "ref '{}': {} '{}' is out of range",
            whole, field, raw
        ))),
        Ok(n) => Ok(n),
    }
}

impl FromStr for PassageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (chapter, rest) = match s.split_once(':') {
            Some((chapter, rest)) => {
                if chapter.is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "ref '{}': empty chapter number",
                        s
                    )));
                }
                (Some(chapter.to_string()), rest)
            }
            None => (None, s),
        };

        let (passage, sentence) = match rest.split_once('.') {
            Some((passage, sentence)) => (
                parse_positive("passage number", passage, s)?,
                Some(parse_positive("sentence number", sentence, s)?),
            ),
            None => (parse_positive("passage number", rest, s)?, None),
        };

        Ok(Self {
            chapter,
            passage,
            sentence,
        })
    }
}

impl fmt::Display for PassageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(chapter) = &self.chapter {
            write!(f, "{}:", chapter)?;
        }
        write!(f, "{}", self.passage)?;
        if let Some(sentence) = self.sentence {
            write!(f, ".{}", sentence)?;
        }
        Ok(())
    }
}
