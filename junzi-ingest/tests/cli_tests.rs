//! Command-line parsing and end-to-end command runs against a temp store

use std::env;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serial_test::serial;
use tempfile::TempDir;

use junzi_common::config::{RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV};
use junzi_common::manifest::ProcessingStatus;
use junzi_common::split::SplitPlan;
use junzi_common::{RefScheme, Work};
use junzi_ingest::{run, Cli, Commands, IngestContext};

const BATCH: &str = r#"{
    "works": [{"id": "daxue", "title": "大學", "titleEn": "Great Learning", "source": "ctext.org"}],
    "chapters": [{"work": "daxue", "slug": "da-xue"}],
    "passages": [
        {"work": "daxue", "chapter": "da-xue", "passage": 1,
         "zh": "大學之道，在明明德，在親民，在止於至善。知止而后有定。",
         "en": "What the great learning teaches, is to illustrate illustrious virtue. The point where to rest being known, the object of pursuit is then determined."}
    ]
}"#;

fn exec(ctx: &IngestContext, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["junzi-ingest"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    run(ctx, cli.command)
}

#[test]
fn test_parse_global_flags_and_scheme() {
    let cli = Cli::try_parse_from([
        "junzi-ingest",
        "--root-folder",
        "/srv/junzi",
        "propose-split",
        "chunk.json",
        "--scheme",
        "dotted",
        "--plan",
        "plan.json",
    ])
    .unwrap();

    assert_eq!(cli.root_folder.unwrap().to_str(), Some("/srv/junzi"));
    match cli.command {
        Commands::ProposeSplit(args) => assert_eq!(args.scheme, Some(RefScheme::Dotted)),
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
#[serial]
fn test_root_folder_env_reaches_the_resolver() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let cli = Cli::try_parse_from(["junzi-ingest", "catalog"]).unwrap();
    assert!(cli.root_folder.is_none());
    assert_eq!(
        RootFolderResolver::new(cli.root_folder, &config).resolve(),
        PathBuf::from("/from/env")
    );

    let cli = Cli::try_parse_from(["junzi-ingest", "-r", "/from/cli", "catalog"]).unwrap();
    assert_eq!(
        RootFolderResolver::new(cli.root_folder, &config).resolve(),
        PathBuf::from("/from/cli")
    );

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_parse_rejects_unknown_status() {
    assert!(Cli::try_parse_from(["junzi-ingest", "status", "daxue", "--set", "done"]).is_err());
    assert!(Cli::try_parse_from(["junzi-ingest", "status", "--set", "raw"]).is_err());
}

#[test]
fn test_ingest_split_publish_pipeline() {
    let dir = TempDir::new().unwrap();
    let ctx = IngestContext::new(TomlConfig::default(), dir.path().join("store")).unwrap();
    let batch = dir.path().join("batch.json");
    fs::write(&batch, BATCH).unwrap();
    let raw_dir = dir.path().join("raw");
    let chunk_dir = dir.path().join("chunks");
    let plan = dir.path().join("plan.json");

    exec(&ctx, &["ingest-raw", batch.to_str().unwrap(), "--out-dir", raw_dir.to_str().unwrap()]).unwrap();
    let raw = raw_dir.join("daxue.json");
    assert_eq!(
        ctx.store.load_manifest().unwrap().status("daxue"),
        Some(ProcessingStatus::Raw)
    );

    exec(&ctx, &["chunk", raw.to_str().unwrap(), "--out-dir", chunk_dir.to_str().unwrap()]).unwrap();
    let chunk = chunk_dir.join("daxue_chunk_01_da-xue.json");
    assert!(chunk.is_file());

    exec(&ctx, &["propose-split", chunk.to_str().unwrap(), "--plan", plan.to_str().unwrap()]).unwrap();

    // Operator review: accept every proposal
    let mut reviewed: SplitPlan = serde_json::from_str(&fs::read_to_string(&plan).unwrap()).unwrap();
    assert_eq!(reviewed.proposals.len(), 1);
    reviewed.accept_all();
    fs::write(&plan, serde_json::to_string_pretty(&reviewed).unwrap()).unwrap();

    exec(&ctx, &["apply-split", chunk.to_str().unwrap(), "--plan", plan.to_str().unwrap()]).unwrap();
    exec(&ctx, &["assemble", "daxue", "--dir", chunk_dir.to_str().unwrap(), "--split-only"]).unwrap();

    let assembled = chunk_dir.join("daxue.json");
    let work: Work = serde_json::from_str(&fs::read_to_string(&assembled).unwrap()).unwrap();
    let refs: Vec<&str> = work.chapters[0]
        .passages
        .iter()
        .map(|p| p.reference.as_str())
        .collect();
    assert_eq!(refs, vec!["1:1", "1:2"]);

    exec(&ctx, &["publish", assembled.to_str().unwrap()]).unwrap();
    assert_eq!(ctx.store.load_work("daxue").unwrap(), work);
    assert_eq!(
        ctx.store.load_manifest().unwrap().status("daxue"),
        Some(ProcessingStatus::Published)
    );

    exec(&ctx, &["audit"]).unwrap();
    exec(&ctx, &["catalog"]).unwrap();
    exec(&ctx, &["catalog", "daxue"]).unwrap();
    exec(&ctx, &["validate", "--work", "daxue"]).unwrap();
}

#[test]
fn test_status_set_refuses_backward_move() {
    let dir = TempDir::new().unwrap();
    let ctx = IngestContext::new(TomlConfig::default(), dir.path().to_path_buf()).unwrap();

    exec(&ctx, &["status", "lunyu", "--set", "split"]).unwrap();
    assert!(exec(&ctx, &["status", "lunyu", "--set", "chunked"]).is_err());
    exec(&ctx, &["status", "lunyu", "--set", "raw", "--note", "re-scrape"]).unwrap();

    let manifest = ctx.store.load_manifest().unwrap();
    let entry = manifest.entry("lunyu").unwrap();
    assert_eq!(entry.status, ProcessingStatus::Raw);
    assert_eq!(entry.note.as_deref(), Some("re-scrape"));
}
