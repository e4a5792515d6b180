//! Subcommand implementations
//!
//! Each command reports to stdout and logs through `tracing`. Library
//! errors are wrapped with the file or work they concern.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use junzi_common::artifacts::ArtifactFilter;
use junzi_common::audit::TranslationAuditor;
use junzi_common::config::TomlConfig;
use junzi_common::ingest::{
    assemble_chunks, load_chunks_from_dir, split_chunk_file_name, write_chunks, RawCorpus,
};
use junzi_common::manifest::{Manifest, ProcessingStatus};
use junzi_common::split::{SplitPlan, Splitter};
use junzi_common::store::write_json_atomic;
use junzi_common::validation::ValidationReport;
use junzi_common::{ChunkDocument, Error, PassageStore, Validator, Work};

use crate::cli::{
    ApplySplitArgs, AssembleArgs, AuditArgs, CatalogArgs, ChunkArgs, Commands, IngestRawArgs,
    ProposeSplitArgs, PublishArgs, ScrubArgs, StatusArgs, ValidateArgs,
};

/// Everything a command needs: loaded config and the opened store
pub struct IngestContext {
    pub config: TomlConfig,
    pub store: PassageStore,
}

impl IngestContext {
    pub fn new(config: TomlConfig, root_folder: PathBuf) -> Result<Self> {
        let store = PassageStore::open(&root_folder).with_context(|| {
            format!("Failed to open passage store at {}", root_folder.display())
        })?;
        Ok(Self { config, store })
    }

    fn validator(&self) -> Validator {
        Validator::from_config(&self.config.validation)
    }

    fn splitter(&self) -> Splitter {
        Splitter::new(ArtifactFilter::from_config(&self.config.validation))
    }

    fn update_status(&self, work_id: &str, status: ProcessingStatus) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        manifest.set_status(work_id, status, None)?;
        self.store
            .save_manifest(&manifest)
            .context("Failed to save manifest")
    }

    fn load_manifest(&self) -> Result<Manifest> {
        self.store.load_manifest().with_context(|| {
            format!("Failed to read manifest {}", self.store.manifest_path().display())
        })
    }
}

/// A document that is either a whole work or a single-chapter chunk
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    Chunk(ChunkDocument),
    Work(Work),
}

fn read_work(path: &Path) -> Result<Work> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a work document", path.display()))
}

fn read_document(path: &Path) -> Result<Document> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is neither a chunk nor a work document", path.display()))
}

fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    write_json_atomic(path, value).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        println!("  error   {}", issue);
    }
    for issue in &report.warnings {
        println!("  warning {}", issue);
    }
}

/// Dispatch one parsed subcommand
pub fn run(ctx: &IngestContext, command: Commands) -> Result<()> {
    match command {
        Commands::Validate(args) => validate(ctx, args),
        Commands::Audit(args) => audit(ctx, args),
        Commands::Scrub(args) => scrub(ctx, args),
        Commands::Chunk(args) => chunk(ctx, args),
        Commands::ProposeSplit(args) => propose_split(ctx, args),
        Commands::ApplySplit(args) => apply_split(ctx, args),
        Commands::Assemble(args) => assemble(ctx, args),
        Commands::IngestRaw(args) => ingest_raw(ctx, args),
        Commands::Publish(args) => publish(ctx, args),
        Commands::Status(args) => status(ctx, args),
        Commands::Catalog(args) => catalog(ctx, args),
    }
}

pub fn validate(ctx: &IngestContext, args: ValidateArgs) -> Result<()> {
    let work = match (&args.input, &args.work) {
        (Some(path), _) => read_work(path)?,
        (None, Some(id)) => ctx.store.load_work(id)?,
        (None, None) => bail!("either a document path or --work is required"),
    };

    let report = ctx.validator().check(&work);
    println!("{}", report);
    print_report(&report);
    if !report.is_accepted() {
        bail!("{} rejected with {} error(s)", report.work_id, report.errors.len());
    }
    Ok(())
}

pub fn audit(ctx: &IngestContext, args: AuditArgs) -> Result<()> {
    let auditor = TranslationAuditor::from_config(&ctx.config.validation);
    let ids = if args.works.is_empty() {
        ctx.store.work_ids()?
    } else {
        args.works
    };

    let mut flagged_total = 0;
    for id in ids {
        let mut work = match ctx.store.load_work(&id) {
            Ok(work) => work,
            Err(e) if e.is_not_found() => {
                println!("  {}: not published", id);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to load {}", id)),
        };

        let report = auditor.audit_work(&work);
        if report.is_clean() {
            println!(
                "  {} ({}): OK ({} chapters, {} passages)",
                report.title_en, id, report.total_chapters, report.total_passages
            );
            continue;
        }

        flagged_total += report.bad_chapters.len();
        println!(
            "  {} ({}): {} bad chapters, {} bad passages",
            report.title_en,
            id,
            report.bad_chapters.len(),
            report.bad_passages
        );
        for ch in &report.bad_chapters {
            println!(
                "    - Chapter {} ({}): {}/{} bad",
                ch.number, ch.slug, ch.bad_passages, ch.total_passages
            );
        }

        if args.fix {
            let removed = auditor.prune_flagged(&mut work);
            ctx.store
                .publish(work, &ctx.validator())
                .with_context(|| format!("Failed to republish {} after pruning", id))?;
            println!("    removed {} chapter(s) for re-ingestion", removed.len());
        }
    }

    if flagged_total > 0 && !args.fix {
        println!("Run with --fix to remove flagged chapters, then re-ingest them.");
    }
    Ok(())
}

pub fn scrub(ctx: &IngestContext, args: ScrubArgs) -> Result<()> {
    let mut work = read_work(&args.input)?;
    let replaced = ArtifactFilter::from_config(&ctx.config.validation).scrub_work(&mut work);
    let output = args.output.unwrap_or(args.input);
    write_document(&output, &work)?;
    println!("{}: replaced {} artifact translation(s)", work.id, replaced);
    Ok(())
}

pub fn chunk(ctx: &IngestContext, args: ChunkArgs) -> Result<()> {
    let work = read_work(&args.input)?;
    let written = write_chunks(&work, &args.out_dir)
        .with_context(|| format!("Failed to write chunks to {}", args.out_dir.display()))?;
    ctx.update_status(&work.id, ProcessingStatus::Chunked)?;
    for path in &written {
        println!("  {}", path.display());
    }
    println!("{}: {} chunk(s) written", work.id, written.len());
    Ok(())
}

pub fn propose_split(ctx: &IngestContext, args: ProposeSplitArgs) -> Result<()> {
    let splitter = ctx.splitter();
    let plan = match read_document(&args.input)? {
        Document::Chunk(chunk) => {
            if let Some(slug) = &args.chapter {
                if *slug != chunk.chapter.slug {
                    bail!(
                        "{} holds chapter '{}', not '{}'",
                        args.input.display(),
                        chunk.chapter.slug,
                        slug
                    );
                }
            }
            let scheme = args.scheme.unwrap_or_else(|| chunk.effective_scheme());
            splitter.propose_chapter(&chunk.id, &chunk.chapter, scheme)
        }
        Document::Work(work) => {
            let slug = args
                .chapter
                .as_deref()
                .ok_or_else(|| anyhow!("--chapter is required for a work document"))?;
            let chapter = work
                .chapter(slug)
                .ok_or_else(|| Error::NotFound(format!("chapter '{}' in {}", slug, work.id)))?;
            let scheme = args.scheme.unwrap_or_else(|| work.effective_scheme());
            splitter.propose_chapter(&work.id, chapter, scheme)
        }
    };

    write_document(&args.plan, &plan)?;
    println!(
        "{}/{}: {} proposal(s) written to {} for review",
        plan.work,
        plan.chapter,
        plan.proposals.len(),
        args.plan.display()
    );
    Ok(())
}

pub fn apply_split(ctx: &IngestContext, args: ApplySplitArgs) -> Result<()> {
    let content = fs::read_to_string(&args.plan)
        .with_context(|| format!("Failed to read plan {}", args.plan.display()))?;
    let plan: SplitPlan = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a split plan", args.plan.display()))?;
    let splitter = ctx.splitter();

    let summary = match read_document(&args.input)? {
        Document::Chunk(mut chunk) => {
            let summary = splitter.apply_plan(&mut chunk.chapter, &plan)?;
            let output = match args.output {
                Some(output) => output,
                None => split_output_path(&args.input)?,
            };
            write_document(&output, &chunk)?;
            println!("  wrote {}", output.display());
            summary
        }
        Document::Work(mut work) => {
            let chapter = work
                .chapter_mut(&plan.chapter)
                .ok_or_else(|| Error::NotFound(format!("chapter '{}' in {}", plan.chapter, plan.work)))?;
            let summary = splitter.apply_plan(chapter, &plan)?;
            if work.chapters.iter().all(|ch| !ch.is_paragraph_level()) {
                ctx.update_status(&work.id, ProcessingStatus::Split)?;
            }
            let output = args.output.unwrap_or(args.input);
            write_document(&output, &work)?;
            println!("  wrote {}", output.display());
            summary
        }
    };

    println!(
        "{}/{}: {} passage(s) became {} ({} artifact(s) replaced)",
        plan.work,
        plan.chapter,
        summary.passages_before,
        summary.passages_after,
        summary.artifacts_replaced
    );
    Ok(())
}

fn split_output_path(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no file name", input.display()))?;
    Ok(input.with_file_name(split_chunk_file_name(name)))
}

pub fn assemble(ctx: &IngestContext, args: AssembleArgs) -> Result<()> {
    let chunks = load_chunks_from_dir(&args.dir, &args.work, args.split_only)
        .with_context(|| format!("Failed to load chunks from {}", args.dir.display()))?;
    for (path, chunk) in &chunks {
        info!(
            chunk = %path.display(),
            passages = chunk.chapter.passages.len(),
            "Assembling chapter {}",
            chunk.chapter.number
        );
    }

    let work = assemble_chunks(chunks.into_iter().map(|(_, c)| c).collect())?;
    let paragraph_chapters = work.chapters.iter().filter(|c| c.is_paragraph_level()).count();
    let output = args
        .output
        .unwrap_or_else(|| args.dir.join(format!("{}.json", work.id)));
    write_document(&output, &work)?;

    if paragraph_chapters == 0 {
        ctx.update_status(&work.id, ProcessingStatus::Split)?;
    } else {
        warn!(
            work = %work.id,
            chapters = paragraph_chapters,
            "Assembled work still has paragraph-level chapters"
        );
    }
    println!(
        "{}: {} chapter(s), {} passage(s) written to {}",
        work.id,
        work.chapters.len(),
        work.passage_count(),
        output.display()
    );
    Ok(())
}

pub fn ingest_raw(ctx: &IngestContext, args: IngestRawArgs) -> Result<()> {
    let works = RawCorpus::from_path(&args.input)
        .with_context(|| format!("Failed to load raw batch {}", args.input.display()))?
        .into_works()?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    for work in &works {
        let path = args.out_dir.join(format!("{}.json", work.id));
        write_document(&path, work)?;
        ctx.update_status(&work.id, ProcessingStatus::Raw)?;
        println!(
            "  {}: {} chapter(s), {} paragraph(s) -> {}",
            work.id,
            work.chapters.len(),
            work.passage_count(),
            path.display()
        );
    }
    Ok(())
}

pub fn publish(ctx: &IngestContext, args: PublishArgs) -> Result<()> {
    let work = read_work(&args.input)?;
    let id = work.id.clone();
    match ctx.store.publish(work, &ctx.validator()) {
        Ok(receipt) => {
            for issue in &receipt.warnings {
                println!("  warning {}", issue);
            }
            println!("{}: published to {} (sha256 {})", id, receipt.path.display(), receipt.checksum);
            Ok(())
        }
        Err(Error::Validation(report)) => {
            println!("{}", report);
            print_report(&report);
            bail!("{} was not published", id)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to publish {}", id)),
    }
}

pub fn status(ctx: &IngestContext, args: StatusArgs) -> Result<()> {
    let mut manifest = ctx.load_manifest()?;

    if let (Some(id), Some(new_status)) = (&args.work, args.set) {
        manifest.set_status(id, new_status, args.note)?;
        ctx.store.save_manifest(&manifest).context("Failed to save manifest")?;
        println!("{}: {}", id, new_status);
        return Ok(());
    }

    let entries: Vec<_> = match &args.work {
        Some(id) => manifest.works.iter().filter(|(k, _)| *k == id).collect(),
        None => manifest.works.iter().collect(),
    };
    if entries.is_empty() {
        println!("No processing status recorded");
    }
    for (id, entry) in entries {
        let note = entry.note.as_deref().unwrap_or("");
        println!(
            "  {:<24} {:<10} {}  {}",
            id,
            entry.status.as_str(),
            entry.updated_at.format("%Y-%m-%d %H:%M"),
            note
        );
    }
    Ok(())
}

pub fn catalog(ctx: &IngestContext, args: CatalogArgs) -> Result<()> {
    let json = match &args.work {
        Some(id) => serde_json::to_string_pretty(&ctx.store.chapter_summaries(id)?)?,
        None => serde_json::to_string_pretty(&ctx.store.catalog(&ctx.config.catalog)?)?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use junzi_common::{Alignment, Chapter, Passage};
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> IngestContext {
        IngestContext::new(TomlConfig::default(), dir.path().join("store")).unwrap()
    }

    fn paragraph_work() -> Work {
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
                alignment: Alignment::Paragraph,
                passages: vec![Passage::new(
                    "1:1",
                    "黃帝者，少典之子，姓公孫，名曰軒轅。生而神靈，弱而能言。",
                    "Huangdi was the son of Shaodian. Born with spiritual powers, he could talk when quite young.",
                )],
            }],
        }
    }

    #[test]
    fn test_document_detects_chunks_and_works() {
        let work = paragraph_work();
        let json = serde_json::to_string(&work).unwrap();
        assert!(matches!(serde_json::from_str::<Document>(&json).unwrap(), Document::Work(_)));

        let chunk = ChunkDocument {
            id: work.id.clone(),
            title: work.title.clone(),
            title_en: work.title_en.clone(),
            source: work.source.clone(),
            ref_scheme: work.ref_scheme,
            chapter: work.chapters[0].clone(),
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(matches!(serde_json::from_str::<Document>(&json).unwrap(), Document::Chunk(_)));
    }

    #[test]
    fn test_unreviewed_plan_is_refused() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let input = dir.path().join("shiji.json");
        let plan = dir.path().join("plan.json");
        write_document(&input, &paragraph_work()).unwrap();

        propose_split(
            &ctx,
            ProposeSplitArgs {
                input: input.clone(),
                chapter: Some("wu-di-ben-ji".to_string()),
                scheme: None,
                plan: plan.clone(),
            },
        )
        .unwrap();

        let err = apply_split(
            &ctx,
            ApplySplitArgs {
                input: input.clone(),
                plan,
                output: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ReviewRequired(_))));
        assert_eq!(read_work(&input).unwrap(), paragraph_work());
    }

    #[test]
    fn test_publish_rejected_work_reports_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut work = paragraph_work();
        work.chapters[0].passages[0].en = "Please help".to_string();
        let input = dir.path().join("shiji.json");
        write_document(&input, &work).unwrap();

        assert!(publish(&ctx, PublishArgs { input }).is_err());
        assert!(!ctx.store.contains("shiji"));
    }
}
