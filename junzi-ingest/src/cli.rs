//! Command-line interface definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use junzi_common::manifest::ProcessingStatus;
use junzi_common::RefScheme;

/// Command-line arguments for junzi-ingest
#[derive(Parser, Debug)]
#[command(name = "junzi-ingest")]
#[command(about = "Ingestion, validation and publication tooling for the Junzi passage store")]
#[command(version)]
pub struct Cli {
    /// Passage store root folder (overrides JUNZI_ROOT_FOLDER and the config file)
    #[arg(short, long, global = true)]
    pub root_folder: Option<PathBuf>,

    /// TOML config file (overrides JUNZI_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a work document without publishing it
    Validate(ValidateArgs),

    /// Report chapters whose translation is mostly missing
    Audit(AuditArgs),

    /// Replace scraping artifacts in `en` by the no-translation sentinel
    Scrub(ScrubArgs),

    /// Break a work into one chunk document per chapter
    Chunk(ChunkArgs),

    /// Write a split plan for one chapter, for review
    ProposeSplit(ProposeSplitArgs),

    /// Apply a reviewed split plan
    ApplySplit(ApplySplitArgs),

    /// Merge chunk documents back into one work
    Assemble(AssembleArgs),

    /// Build paragraph-level works from a raw corpus batch
    IngestRaw(IngestRawArgs),

    /// Validate and atomically publish a work to the store
    Publish(PublishArgs),

    /// Show or set processing status
    Status(StatusArgs),

    /// List published works, or the chapters of one work
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Work document; omit to validate a published work
    #[arg(required_unless_present = "work")]
    pub input: Option<PathBuf>,

    /// Published work id
    #[arg(long, conflicts_with = "input")]
    pub work: Option<String>,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Published work ids (all when omitted)
    pub works: Vec<String>,

    /// Remove flagged chapters and republish so they can be re-ingested
    #[arg(long)]
    pub fix: bool,
}

#[derive(Args, Debug)]
pub struct ScrubArgs {
    /// Work document
    pub input: PathBuf,

    /// Output path (rewrites the input when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    /// Work document
    pub input: PathBuf,

    /// Directory receiving the chunk files
    #[arg(long)]
    pub out_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ProposeSplitArgs {
    /// Chunk document or work document
    pub input: PathBuf,

    /// Chapter slug (required for work documents)
    #[arg(long)]
    pub chapter: Option<String>,

    /// Numbering scheme; defaults to the work's declared or inferred scheme
    #[arg(long)]
    pub scheme: Option<RefScheme>,

    /// Plan file to write
    #[arg(long)]
    pub plan: PathBuf,
}

#[derive(Args, Debug)]
pub struct ApplySplitArgs {
    /// Chunk document or work document the plan was proposed against
    pub input: PathBuf,

    /// Reviewed plan file
    #[arg(long)]
    pub plan: PathBuf,

    /// Output path; chunks default to `<name>_split.json`, works are rewritten
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Work id
    pub work: String,

    /// Directory holding the chunk files
    #[arg(long)]
    pub dir: PathBuf,

    /// Fail when a chunk has no split version
    #[arg(long)]
    pub split_only: bool,

    /// Output path (defaults to `<dir>/<work>.json`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct IngestRawArgs {
    /// Raw corpus batch document
    pub input: PathBuf,

    /// Directory receiving one `<work>.json` per work
    #[arg(long)]
    pub out_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Work document
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Work id (all works when omitted)
    pub work: Option<String>,

    /// New status to record
    #[arg(long, requires = "work")]
    pub set: Option<ProcessingStatus>,

    /// Note stored with the new status
    #[arg(long, requires = "set")]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// List the chapters of this work instead
    pub work: Option<String>,
}
