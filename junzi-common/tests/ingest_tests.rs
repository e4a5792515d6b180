//! Raw ingest → chunk → split → assemble → publish, through the filesystem

use std::fs;

use tempfile::TempDir;

use junzi_common::audit::TranslationAuditor;
use junzi_common::ingest::{
    assemble_chunks, load_chunks_from_dir, split_chunk_file_name, write_chunks, RawCorpus,
};
use junzi_common::model::ChunkDocument;
use junzi_common::split::Splitter;
use junzi_common::store::write_json_atomic;
use junzi_common::{PassageStore, RefScheme, Validator};

const BATCH: &str = r#"{
    "works": [{"id": "shiji", "title": "史記", "titleEn": "Records of the Grand Historian", "source": "ctext.org"}],
    "chapters": [
        {"work": "shiji", "slug": "wu-di-ben-ji", "number": "1"},
        {"work": "shiji", "slug": "xia-ben-ji", "number": "2"}
    ],
    "passages": [
        {"work": "shiji", "chapter": "wu-di-ben-ji", "passage": 1,
         "zh": "黃帝者，少典之子，姓公孫，名曰軒轅。生而神靈，弱而能言。",
         "en": "Huangdi was the son of Shaodian. Born with spiritual powers, he could talk when quite young."},
        {"work": "shiji", "chapter": "xia-ben-ji", "passage": 1,
         "zh": "夏禹，名曰文命。",
         "en": "Yu of Xia was named Wenming."}
    ]
}"#;

#[test]
fn test_raw_batch_to_published_work() {
    let dir = TempDir::new().unwrap();
    let batch_path = dir.path().join("batch.json");
    fs::write(&batch_path, BATCH).unwrap();
    let chunk_dir = dir.path().join("chunks");

    let work = RawCorpus::from_path(&batch_path)
        .unwrap()
        .into_works()
        .unwrap()
        .remove(0);
    assert!(work.chapters.iter().all(|c| c.is_paragraph_level()));

    let written = write_chunks(&work, &chunk_dir).unwrap();
    assert_eq!(written.len(), 2);

    // Split the first chunk only; the second is already sentence-sized
    let splitter = Splitter::default();
    let first = &written[0];
    let mut chunk: ChunkDocument =
        serde_json::from_str(&fs::read_to_string(first).unwrap()).unwrap();
    let mut plan = splitter.propose_chapter(&chunk.id, &chunk.chapter, RefScheme::Shift);
    plan.accept_all();
    splitter.apply_plan(&mut chunk.chapter, &plan).unwrap();
    let name = first.file_name().unwrap().to_str().unwrap();
    write_json_atomic(&chunk_dir.join(split_chunk_file_name(name)), &chunk).unwrap();

    assert!(load_chunks_from_dir(&chunk_dir, "shiji", true).is_err());
    let chunks = load_chunks_from_dir(&chunk_dir, "shiji", false).unwrap();
    assert!(chunks[0].0.to_string_lossy().ends_with("_split.json"));

    let work = assemble_chunks(chunks.into_iter().map(|(_, c)| c).collect()).unwrap();
    assert_eq!(work.chapters[0].passages.len(), 2);
    assert!(TranslationAuditor::default().audit_work(&work).is_clean());

    let store = PassageStore::open(dir.path().join("store")).unwrap();
    let receipt = store.publish(work, &Validator::default()).unwrap();
    assert!(receipt.path.ends_with("works/shiji.json"));
}

#[test]
fn test_chunks_for_unknown_work_not_found() {
    let dir = TempDir::new().unwrap();
    let err = load_chunks_from_dir(dir.path(), "mengzi", false).unwrap_err();
    assert!(err.is_not_found());
}
