//! Passage Store: published work documents on disk
//!
//! Layout under the root folder:
//!
//! ```text
//! <root>/works/<work-id>.json   one immutable snapshot per work
//! <root>/manifest.json          processing status per work
//! ```
//!
//! Publication is single-writer and atomic: the document is written to a
//! temporary file beside its target, re-read and validated, fsynced, then
//! renamed into place. Readers take no locks; they see either the previous
//! snapshot or the new one, never a partial file.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::CatalogMeta;
use crate::manifest::Manifest;
use crate::model::{Chapter, Work};
use crate::validation::{is_valid_work_id, ValidationIssue, Validator};
use crate::{Error, Result};

const WORKS_DIR: &str = "works";
const MANIFEST_FILE: &str = "manifest.json";

/// Catalog listing entry for the reader's library view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub title_en: String,
    pub author: String,
    pub author_en: String,
    pub source: String,
}

/// Chapter listing entry without passage bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub number: String,
    pub title: String,
    pub slug: String,
    pub passage_count: usize,
}

/// Result of a successful publication
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub path: PathBuf,
    /// Hex SHA-256 of the published bytes
    pub checksum: String,
    pub warnings: Vec<ValidationIssue>,
}

/// Directory-backed store of published works
#[derive(Debug, Clone)]
pub struct PassageStore {
    root: PathBuf,
}

impl PassageStore {
    /// Open a store, creating its directories when missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(WORKS_DIR))?;
        debug!("Passage store opened at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        manifest.save(&self.manifest_path())
    }

    /// Document path for a work id; `None` for ids that are not valid slugs
    pub fn work_path(&self, id: &str) -> Option<PathBuf> {
        is_valid_work_id(id).then(|| self.root.join(WORKS_DIR).join(format!("{}.json", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.work_path(id).is_some_and(|p| p.is_file())
    }

    /// Load a published work. Unknown or malformed ids are `Error::NotFound`.
    pub fn load_work(&self, id: &str) -> Result<Work> {
        let path = self
            .work_path(id)
            .ok_or_else(|| Error::NotFound(format!("work '{}'", id)))?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("work '{}'", id)));
            }
            Err(e) => return Err(e.into()),
        };
        let work: Work = serde_json::from_str(&content)?;
        debug!(work = id, chapters = work.chapters.len(), "Work loaded");
        Ok(work)
    }

    /// Load one chapter by slug, falling back to the first chapter whose
    /// display number matches
    pub fn load_chapter(&self, id: &str, slug: &str) -> Result<Chapter> {
        let mut work = self.load_work(id)?;
        let index = work
            .chapters
            .iter()
            .position(|ch| ch.slug == slug)
            .or_else(|| work.chapters.iter().position(|ch| ch.number == slug))
            .ok_or_else(|| Error::NotFound(format!("chapter '{}' in work '{}'", slug, id)))?;
        Ok(work.chapters.swap_remove(index))
    }

    /// Ids of every published work, sorted
    pub fn work_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(WORKS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_work_id(stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Catalog of published works that have at least one chapter.
    /// Unreadable documents are skipped with a warning.
    pub fn catalog(&self, meta: &BTreeMap<String, CatalogMeta>) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for id in self.work_ids()? {
            let work = match self.load_work(&id) {
                Ok(work) => work,
                Err(e) => {
                    warn!("Skipping {} in catalog: {}", id, e);
                    continue;
                }
            };
            if work.chapters.is_empty() {
                continue;
            }
            let author = meta.get(&id).cloned().unwrap_or_default();
            entries.push(CatalogEntry {
                id,
                title: work.title,
                title_en: work.title_en,
                author: author.author,
                author_en: author.author_en,
                source: work.source,
            });
        }
        Ok(entries)
    }

    pub fn chapter_summaries(&self, id: &str) -> Result<Vec<ChapterSummary>> {
        let work = self.load_work(id)?;
        Ok(work
            .chapters
            .iter()
            .map(|ch| ChapterSummary {
                number: ch.number.clone(),
                title: ch.title.clone(),
                slug: ch.slug.clone(),
                passage_count: ch.passages.len(),
            })
            .collect())
    }

    /// Validate and atomically publish a work, replacing any previous
    /// snapshot wholesale and recording the checksum in the manifest.
    /// Nothing is written when validation fails.
    pub fn publish(&self, work: Work, validator: &Validator) -> Result<PublishReceipt> {
        let (work, warnings) = validator.validate(work).into_result()?;
        let path = self.work_path(&work.id).ok_or_else(|| {
            Error::InvalidInput(format!("work id '{}' is not a valid store key", work.id))
        })?;

        if let Ok(previous) = self.load_work(&work.id) {
            let kept: HashSet<&str> = work.chapters.iter().map(|ch| ch.slug.as_str()).collect();
            for chapter in previous.chapters.iter().filter(|ch| !kept.contains(ch.slug.as_str())) {
                warn!(
                    work = %work.id,
                    chapter = %chapter.slug,
                    "Previously published chapter slug is missing from the new snapshot"
                );
            }
        }

        // An unreadable manifest fails the publish before anything is replaced
        let mut manifest = self.load_manifest()?;

        let bytes = to_document_bytes(&work)?;
        let checksum = write_verified(&path, &bytes, |written| {
            let reread: Work = serde_json::from_slice(written)?;
            validator.validate(reread).into_result().map(|_| ())
        })?;

        // The snapshot is live from here on; a manifest failure is only logged
        if let Err(e) = manifest
            .mark_published(&work.id, checksum.clone())
            .and_then(|_| self.save_manifest(&manifest))
        {
            error!(work = %work.id, "Work published but manifest not updated: {}", e);
        }

        info!(
            work = %work.id,
            path = %path.display(),
            checksum = %checksum,
            warnings = warnings.len(),
            "Work published"
        );
        Ok(PublishReceipt {
            path,
            checksum,
            warnings,
        })
    }
}

/// Pretty JSON with a trailing newline, non-ASCII left unescaped
pub fn to_document_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Hex SHA-256 digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Atomically replace `path` with the JSON form of `value`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = to_document_bytes(value)?;
    write_verified(path, &bytes, |_| Ok(())).map(|_| ())
}

/// Temp write → fsync → verify → rename → fsync dir. The temp file is
/// removed on any failure. Returns the checksum of the written bytes.
fn write_verified<F>(path: &Path, bytes: &[u8], verify: F) -> Result<String>
where
    F: FnOnce(&[u8]) -> Result<()>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("no file name in {}", path.display())))?;
    let tmp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let result = (|| -> Result<String> {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);

        let written = fs::read(&tmp_path)?;
        verify(&written)?;
        fs::rename(&tmp_path, path)?;
        Ok(sha256_hex(&written))
    })();

    match result {
        Ok(checksum) => {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
            Ok(checksum)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}
