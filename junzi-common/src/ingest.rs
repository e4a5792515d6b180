//! Ingestion helpers: raw corpus batches, chunking and chunk assembly
//!
//! Raw scrapes arrive as paragraph blobs keyed by
//! `(work id, chapter slug, passage number)`. [`RawCorpus::into_works`]
//! turns a batch into paragraph-level [`Work`]s. Large works are then broken
//! into one [`ChunkDocument`] per chapter so each chapter can be split and
//! reviewed on its own, and reassembled with [`assemble_chunks`] once done.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{Alignment, Chapter, ChunkDocument, Passage, Work, NO_TRANSLATION};
use crate::store::write_json_atomic;
use crate::text::normalize_whitespace;
use crate::validation::is_valid_work_id;
use crate::{Error, Result};

/// Work-level metadata in a raw batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWork {
    pub id: String,
    pub title: String,
    pub title_en: String,
    pub source: String,
}

/// Chapter metadata in a raw batch. Missing numbers are assigned in batch
/// order; missing titles are derived from the slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChapter {
    pub work: String,
    pub slug: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One scraped paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPassage {
    pub work: String,
    pub chapter: String,
    pub passage: u32,
    pub zh: String,
    #[serde(default)]
    pub en: String,
}

/// One ingestion batch as scraped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCorpus {
    #[serde(default)]
    pub works: Vec<RawWork>,
    #[serde(default)]
    pub chapters: Vec<RawChapter>,
    #[serde(default)]
    pub passages: Vec<RawPassage>,
}

impl RawCorpus {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let corpus: RawCorpus = serde_json::from_str(&content)?;
        debug!(
            works = corpus.works.len(),
            chapters = corpus.chapters.len(),
            passages = corpus.passages.len(),
            "Raw corpus loaded from {}",
            path.display()
        );
        Ok(corpus)
    }

    /// Build one paragraph-level work per batch work.
    ///
    /// Refs are `<chapter number>:<passage number>`. Chapters with no
    /// passages are dropped. A missing translation becomes the sentinel.
    pub fn into_works(self) -> Result<Vec<Work>> {
        let work_ids: HashSet<&str> = self.works.iter().map(|w| w.id.as_str()).collect();
        if work_ids.len() != self.works.len() {
            return Err(Error::InvalidInput("duplicate work id in raw batch".to_string()));
        }

        let mut chapter_keys = HashSet::new();
        for ch in &self.chapters {
            if !work_ids.contains(ch.work.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "chapter '{}' belongs to unknown work '{}'",
                    ch.slug, ch.work
                )));
            }
            if !chapter_keys.insert((ch.work.as_str(), ch.slug.as_str())) {
                return Err(Error::InvalidInput(format!(
                    "duplicate chapter '{}/{}' in raw batch",
                    ch.work, ch.slug
                )));
            }
        }

        let mut grouped: HashMap<(String, String), BTreeMap<u32, RawPassage>> = HashMap::new();
        for p in self.passages {
            if !chapter_keys.contains(&(p.work.as_str(), p.chapter.as_str())) {
                return Err(Error::InvalidInput(format!(
                    "passage {} refers to unknown chapter '{}/{}'",
                    p.passage, p.work, p.chapter
                )));
            }
            if p.passage == 0 {
                return Err(Error::InvalidInput(format!(
                    "{}/{}: passage numbers start at 1",
                    p.work, p.chapter
                )));
            }
            let key = (p.work.clone(), p.chapter.clone());
            let slot = grouped.entry(key).or_default();
            if slot.contains_key(&p.passage) {
                return Err(Error::InvalidInput(format!(
                    "duplicate passage {}/{}:{}",
                    p.work, p.chapter, p.passage
                )));
            }
            slot.insert(p.passage, p);
        }

        let mut works = Vec::with_capacity(self.works.len());
        for raw in self.works {
            let mut chapters = Vec::new();
            let mut ordinal = 0;
            for ch in self.chapters.iter().filter(|c| c.work == raw.id) {
                ordinal += 1;
                let Some(passages) = grouped.remove(&(raw.id.clone(), ch.slug.clone())) else {
                    warn!(work = %raw.id, chapter = %ch.slug, "Chapter has no passages, skipped");
                    continue;
                };
                let number = ch
                    .number
                    .clone()
                    .unwrap_or_else(|| ordinal.to_string());
                let title = ch
                    .title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| title_from_slug(&ch.slug));

                let passages = passages
                    .into_values()
                    .map(|p| {
                        let en = normalize_whitespace(&p.en);
                        Passage::new(
                            format!("{}:{}", number, p.passage),
                            p.zh.trim(),
                            if en.is_empty() {
                                NO_TRANSLATION.to_string()
                            } else {
                                en
                            },
                        )
                    })
                    .collect();

                chapters.push(Chapter {
                    number,
                    title,
                    slug: ch.slug.clone(),
                    alignment: Alignment::Paragraph,
                    passages,
                });
            }

            if chapters.iter().all(|c| c.number.parse::<u32>().is_ok()) {
                chapters.sort_by_key(|c| c.number.parse::<u32>().unwrap_or(u32::MAX));
            }

            info!(
                work = %raw.id,
                chapters = chapters.len(),
                "Raw work ingested"
            );
            works.push(Work {
                id: raw.id,
                title: raw.title,
                title_en: raw.title_en,
                source: raw.source,
                ref_scheme: None,
                chapters,
            });
        }
        Ok(works)
    }
}

/// `li-lou-i` → `Li Lou I`
pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `<id>_chunk_<NN>_<slug>.json`, with `NN` the 1-based chapter position
pub fn chunk_file_name(work_id: &str, index: usize, slug: &str) -> String {
    format!("{}_chunk_{:02}_{}.json", work_id, index, slug)
}

/// File name a chunk takes once its chapter has been split
pub fn split_chunk_file_name(file_name: &str) -> String {
    match file_name.strip_suffix(".json") {
        Some(stem) if !stem.ends_with("_split") => format!("{}_split.json", stem),
        _ => file_name.to_string(),
    }
}

/// One chunk document per chapter, paired with its file name
pub fn chunk_work(work: &Work) -> Vec<(String, ChunkDocument)> {
    work.chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| {
            (
                chunk_file_name(&work.id, i + 1, &chapter.slug),
                ChunkDocument {
                    id: work.id.clone(),
                    title: work.title.clone(),
                    title_en: work.title_en.clone(),
                    source: work.source.clone(),
                    ref_scheme: work.ref_scheme,
                    chapter: chapter.clone(),
                },
            )
        })
        .collect()
}

/// Write the chunks of `work` into `dir`
pub fn write_chunks(work: &Work, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (name, chunk) in chunk_work(work) {
        let path = dir.join(name);
        write_json_atomic(&path, &chunk)?;
        written.push(path);
    }
    info!(work = %work.id, chunks = written.len(), dir = %dir.display(), "Work chunked");
    Ok(written)
}

/// Read the chunks of one work from `dir`, in file name order.
///
/// When both `x.json` and `x_split.json` exist the split one is used.
/// With `split_only` set, chunks without a split version are an error.
pub fn load_chunks_from_dir(
    dir: &Path,
    work_id: &str,
    split_only: bool,
) -> Result<Vec<(PathBuf, ChunkDocument)>> {
    if !is_valid_work_id(work_id) {
        return Err(Error::InvalidInput(format!("invalid work id '{}'", work_id)));
    }
    let prefix = format!("{}_chunk_", work_id);

    // base file name -> (plain, split)
    let mut found: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
        else {
            continue;
        };
        if !name.starts_with(&prefix) || !name.ends_with(".json") {
            continue;
        }
        match name.strip_suffix("_split.json") {
            Some(stem) => found.entry(format!("{}.json", stem)).or_default().1 = Some(path),
            None => found.entry(name.clone()).or_default().0 = Some(path),
        }
    }

    let mut chunks = Vec::with_capacity(found.len());
    for (base, (plain, split)) in found {
        let path = match (plain, split) {
            (_, Some(split)) => split,
            (Some(_), None) if split_only => {
                return Err(Error::InvalidInput(format!(
                    "chunk {} has not been split yet",
                    base
                )));
            }
            (Some(plain), None) => plain,
            (None, None) => continue,
        };
        let content = fs::read_to_string(&path)?;
        let chunk: ChunkDocument = serde_json::from_str(&content)?;
        debug!(chunk = %path.display(), "Chunk loaded");
        chunks.push((path, chunk));
    }

    if chunks.is_empty() {
        return Err(Error::NotFound(format!(
            "no chunks for '{}' in {}",
            work_id,
            dir.display()
        )));
    }
    Ok(chunks)
}

/// Merge chunk documents, in the given order, into one work.
/// Every chunk must carry the same work metadata as the first.
pub fn assemble_chunks(chunks: Vec<ChunkDocument>) -> Result<Work> {
    let mut iter = chunks.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidInput("no chunks to assemble".to_string()))?;

    let mut slugs = HashSet::new();
    slugs.insert(first.chapter.slug.clone());
    let mut work = Work {
        id: first.id,
        title: first.title,
        title_en: first.title_en,
        source: first.source,
        ref_scheme: first.ref_scheme,
        chapters: vec![first.chapter],
    };

    for chunk in iter {
        if chunk.id != work.id
            || chunk.title != work.title
            || chunk.title_en != work.title_en
            || chunk.source != work.source
        {
            return Err(Error::InvalidInput(format!(
                "chunk for chapter '{}' carries metadata of '{}', expected '{}'",
                chunk.chapter.slug, chunk.id, work.id
            )));
        }
        if chunk.ref_scheme != work.ref_scheme {
            return Err(Error::InvalidInput(format!(
                "chunk for chapter '{}' declares scheme {:?}, expected {:?}",
                chunk.chapter.slug, chunk.ref_scheme, work.ref_scheme
            )));
        }
        if !slugs.insert(chunk.chapter.slug.clone()) {
            return Err(Error::InvalidInput(format!(
                "chapter '{}' appears in more than one chunk",
                chunk.chapter.slug
            )));
        }
        work.chapters.push(chunk.chapter);
    }

    info!(
        work = %work.id,
        chapters = work.chapters.len(),
        passages = work.passage_count(),
        "Chunks assembled"
    );
    Ok(work)
}
