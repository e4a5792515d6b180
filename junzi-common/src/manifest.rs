//! Per-work processing status manifest
//!
//! Replaces the informal "done / in progress" notes with one record per work:
//! `raw` (scraped paragraphs) → `chunked` (broken into per-chapter chunk
//! files) → `split` (sentence-aligned and reassembled) → `published`.
//!
//! Moving forward may skip stages. Moving backward is only allowed to `raw`,
//! which is what re-ingesting a work does.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::write_json_atomic;
use crate::{Error, Result};

/// Pipeline stage of a work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Raw,
    Chunked,
    Split,
    Published,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Raw => "raw",
            ProcessingStatus::Chunked => "chunked",
            ProcessingStatus::Split => "split",
            ProcessingStatus::Published => "published",
        }
    }

    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        next == ProcessingStatus::Raw || next >= *self
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(ProcessingStatus::Raw),
            "chunked" => Ok(ProcessingStatus::Chunked),
            "split" => Ok(ProcessingStatus::Split),
            "published" => Ok(ProcessingStatus::Published),
            other => Err(format!(
                "unknown status '{}' (expected raw, chunked, split or published)",
                other
            )),
        }
    }
}

/// Manifest record for one work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub status: ProcessingStatus,
    pub updated_at: DateTime<Utc>,
    /// SHA-256 of the published document, set on publication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Status of every work the tooling knows about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub works: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest; a missing file is an empty manifest
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No manifest at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn status(&self, work_id: &str) -> Option<ProcessingStatus> {
        self.works.get(work_id).map(|e| e.status)
    }

    pub fn entry(&self, work_id: &str) -> Option<&ManifestEntry> {
        self.works.get(work_id)
    }

    /// Work ids currently at `status`, in id order
    pub fn with_status(&self, status: ProcessingStatus) -> Vec<&str> {
        self.works
            .iter()
            .filter(|(_, e)| e.status == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Record a new stage for a work. The checksum is cleared unless the
    /// work is being published.
    pub fn set_status(
        &mut self,
        work_id: &str,
        status: ProcessingStatus,
        note: Option<String>,
    ) -> Result<()> {
        self.transition(work_id, status, None, note)
    }

    /// Record a publication together with the document checksum
    pub fn mark_published(&mut self, work_id: &str, checksum: String) -> Result<()> {
        self.transition(work_id, ProcessingStatus::Published, Some(checksum), None)
    }

    fn transition(
        &mut self,
        work_id: &str,
        status: ProcessingStatus,
        checksum: Option<String>,
        note: Option<String>,
    ) -> Result<()> {
        if let Some(current) = self.status(work_id) {
            if !current.can_transition_to(status) {
                return Err(Error::InvalidInput(format!(
                    "{}: cannot move from {} back to {} (reset to raw to re-ingest)",
                    work_id, current, status
                )));
            }
        }

        info!(work = work_id, status = %status, "Processing status updated");
        self.works.insert(
            work_id.to_string(),
            ManifestEntry {
                status,
                updated_at: Utc::now(),
                checksum,
                note,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        let mut manifest = Manifest::default();
        manifest.set_status("mengzi", ProcessingStatus::Raw, None).unwrap();
        manifest.set_status("mengzi", ProcessingStatus::Split, None).unwrap();
        manifest.mark_published("mengzi", "abc".to_string()).unwrap();

        let entry = manifest.entry("mengzi").unwrap();
        assert_eq!(entry.status, ProcessingStatus::Published);
        assert_eq!(entry.checksum.as_deref(), Some("abc"));
    }

    #[test]
    fn test_backward_transition_only_to_raw() {
        let mut manifest = Manifest::default();
        manifest.set_status("zhuangzi", ProcessingStatus::Split, None).unwrap();
        assert!(manifest
            .set_status("zhuangzi", ProcessingStatus::Chunked, None)
            .is_err());
        manifest
            .set_status("zhuangzi", ProcessingStatus::Raw, Some("re-scrape".to_string()))
            .unwrap();
        assert_eq!(manifest.status("zhuangzi"), Some(ProcessingStatus::Raw));
    }

    #[test]
    fn test_with_status_query() {
        let mut manifest = Manifest::default();
        manifest.set_status("xunzi", ProcessingStatus::Chunked, None).unwrap();
        manifest.set_status("mozi", ProcessingStatus::Chunked, None).unwrap();
        manifest.set_status("liezi", ProcessingStatus::Raw, None).unwrap();
        assert_eq!(
            manifest.with_status(ProcessingStatus::Chunked),
            vec!["mozi", "xunzi"]
        );
    }

    #[test]
    fn test_status_parse_and_serialize() {
        assert_eq!("Split".parse::<ProcessingStatus>().unwrap(), ProcessingStatus::Split);
        assert!("done".parse::<ProcessingStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::Published).unwrap(),
            "\"published\""
        );
    }
}
