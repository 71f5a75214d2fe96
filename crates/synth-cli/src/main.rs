//! `synth`: an offline-runnable driver for the Synthesis Orchestrator.
//! Wires the in-memory backend and the no-network [`demo_provider::DemoProvider`]
//! together (see [`context_builder::build_demo`]) so the full 14-stage
//! pipeline (§4.H) can be exercised end to end without API keys or a
//! database: a `clap` CLI with a global output-format flag, subcommands
//! delegating to an `execute_*` function, and colored `pretty`/`json`
//! rendering.

mod context_builder;
mod demo_provider;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use synth_core::{ChapterSourceKind, Document, DocumentType, SynthesisConfig};
use synth_ingest::{dedup_scan, embed_chapter};
use synth_orchestrator::SynthesisOrchestrator;

#[derive(Parser)]
#[command(name = "synth")]
#[command(about = "Synthesis Orchestrator CLI - offline demo driver", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Path to a synth.toml config file; defaults embedded if omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, ValueEnum)]
enum DocumentTypeArg {
    SurgicalDisease,
    PureAnatomy,
    SurgicalTechnique,
}

impl From<DocumentTypeArg> for DocumentType {
    fn from(arg: DocumentTypeArg) -> Self {
        match arg {
            DocumentTypeArg::SurgicalDisease => DocumentType::SurgicalDisease,
            DocumentTypeArg::PureAnatomy => DocumentType::PureAnatomy,
            DocumentTypeArg::SurgicalTechnique => DocumentType::SurgicalTechnique,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SourceKindArg {
    Standalone,
    Textbook,
    Paper,
}

impl From<SourceKindArg> for ChapterSourceKind {
    fn from(arg: SourceKindArg) -> Self {
        match arg {
            SourceKindArg::Standalone => ChapterSourceKind::Standalone,
            SourceKindArg::Textbook => ChapterSourceKind::Textbook,
            SourceKindArg::Paper => ChapterSourceKind::Paper,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the full 14-stage pipeline for a new Document and prints the
    /// synthesized result.
    Synthesize {
        /// Topic to synthesize a document about.
        topic: String,

        /// Document type, governing the guidance section-count table.
        #[arg(long, value_enum, default_value = "surgical-disease")]
        document_type: DocumentTypeArg,

        /// Submit the run to the background task adapter instead of
        /// awaiting it inline.
        #[arg(long)]
        background: bool,
    },

    /// Embeds, chunks, and duplicate-scans a Chapter's text against the
    /// in-process corpus (§4.J). Each invocation starts from an empty
    /// corpus, so duplicate detection only has effect across a single
    /// `--seed-duplicate-of` pairing within one process run.
    Ingest {
        /// Chapter title.
        title: String,

        /// Path to a plain-text file containing the chapter body.
        text_file: PathBuf,

        /// Where this chapter came from (affects duplicate-group preference).
        #[arg(long, value_enum, default_value = "standalone")]
        source_kind: SourceKindArg,
    },

    /// Prints the default configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .init();

    match execute_command(&cli).await {
        Ok(value) => {
            print_output(&cli.output, &value)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<serde_json::Value> {
    match &cli.command {
        Commands::Synthesize { topic, document_type, background } => {
            execute_synthesize(cli, topic, document_type.clone(), *background).await
        }
        Commands::Ingest { title, text_file, source_kind } => execute_ingest(cli, title, text_file, source_kind.clone()).await,
        Commands::Config => execute_config(),
    }
}

fn load_config(cli: &Cli) -> Result<SynthesisConfig> {
    SynthesisConfig::load(cli.config.as_deref()).context("failed to load configuration")
}

async fn execute_synthesize(
    cli: &Cli,
    topic: &str,
    document_type: DocumentTypeArg,
    background: bool,
) -> Result<serde_json::Value> {
    let config = load_config(cli)?;
    let demo = context_builder::build_demo(config);

    let document = Document::new(topic, document_type.into());
    let document_id = document.id;
    demo.ctx.documents.create(document.clone()).await.context("failed to persist new document")?;

    if background {
        let documents = demo.ctx.documents.clone();
        let checkpoints = demo.ctx.checkpoints.clone();
        let chapters = demo.ctx.chapters.clone();
        let vector_index = demo.ctx.vector_index.clone();
        let lexical_index = demo.ctx.lexical_index.clone();
        let evidence_db = demo.ctx.evidence_db.clone();
        let evidence_cache = demo.ctx.evidence_cache.clone();
        let publisher = demo.ctx.publisher.clone();
        let gateway = demo.ctx.gateway.clone();
        let config = demo.ctx.config.clone();

        let job = synth_tasks::FnJob::new(move || {
            let ctx = synth_orchestrator::OrchestratorContext {
                config: config.clone(),
                gateway: gateway.clone(),
                documents: documents.clone(),
                checkpoints: checkpoints.clone(),
                chapters: chapters.clone(),
                vector_index: vector_index.clone(),
                lexical_index: lexical_index.clone(),
                evidence_db: evidence_db.clone(),
                evidence_cache: evidence_cache.clone(),
                publisher: publisher.clone(),
                available_images: Vec::new(),
            };
            async move {
                let doc = SynthesisOrchestrator::new(ctx).run(document_id).await?;
                Ok::<_, synth_core::SynthError>(serde_json::to_value(&doc)?)
            }
        });

        let task_id = demo.tasks.submit("document_synthesis", document_id, Arc::new(job)).await.context("failed to submit background task")?;
        return Ok(serde_json::json!({
            "task_id": task_id,
            "document_id": document_id,
            "status": "submitted",
        }));
    }

    let orchestrator = SynthesisOrchestrator::new(demo.ctx);
    let document = orchestrator.run(document_id).await.context("synthesis run failed")?;
    Ok(serde_json::to_value(&document)?)
}

async fn execute_ingest(cli: &Cli, title: &str, text_file: &PathBuf, source_kind: SourceKindArg) -> Result<serde_json::Value> {
    let config = load_config(cli)?;
    let demo = context_builder::build_demo(config);

    let text = std::fs::read_to_string(text_file).with_context(|| format!("failed to read {}", text_file.display()))?;
    let mut chapter = synth_core::Chapter::new(title, text, source_kind.into());

    embed_chapter(&mut chapter, &demo.ctx.gateway).await.context("failed to embed chapter")?;

    let existing_chapters = demo.ctx.chapters.list_chapters().await?;
    let duplicate_result = dedup_scan::scan_for_duplicates(
        &chapter,
        &existing_chapters,
        demo.ctx.vector_index.as_ref(),
        demo.ctx.config.chapter_dedup_threshold,
    )
    .await
    .context("failed to scan for chapter duplicates")?;

    if let Some(embedding) = chapter.embedding.clone() {
        demo.ctx.vector_index.upsert(chapter.id, embedding).await?;
    }

    if let Some(result) = &duplicate_result {
        if let Some(update) = result.updates.iter().find(|u| u.chapter_id == chapter.id) {
            chapter.is_duplicate = update.is_duplicate;
            chapter.duplicate_group_id = Some(update.duplicate_group_id);
            chapter.preference_score = Some(update.preference_score);
        }
        for update in &result.updates {
            if update.chapter_id == chapter.id {
                continue;
            }
            if let Some(mut other) = demo.ctx.chapters.get_chapter(update.chapter_id).await? {
                other.is_duplicate = update.is_duplicate;
                other.duplicate_group_id = Some(update.duplicate_group_id);
                other.preference_score = Some(update.preference_score);
                demo.ctx.chapters.update_chapter(other).await?;
            }
        }
    }

    demo.ctx.chapters.create_chapter(chapter.clone()).await?;

    Ok(serde_json::json!({
        "chapter_id": chapter.id,
        "word_count": chapter.word_count,
        "chunk_count": chapter.chunks.as_ref().map(Vec::len).unwrap_or(0),
        "is_duplicate": chapter.is_duplicate,
        "duplicate_group_id": chapter.duplicate_group_id,
    }))
}

fn execute_config() -> Result<serde_json::Value> {
    let config = SynthesisConfig::default();
    let toml = toml::to_string_pretty(&config).context("failed to render default config as TOML")?;
    Ok(serde_json::json!({ "default_config_toml": toml }))
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => print_pretty(value)?,
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => println!("{}: {}", key_colored, s.green()),
                    serde_json::Value::Number(n) => println!("{}: {}", key_colored, n.to_string().yellow()),
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}: {}", key_colored, val_colored);
                    }
                    _ => println!("{}: {}", key_colored, val),
                }
            }
        }
        other => println!("{other}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_arg_maps_to_every_document_type() {
        assert!(matches!(DocumentType::from(DocumentTypeArg::SurgicalDisease), DocumentType::SurgicalDisease));
        assert!(matches!(DocumentType::from(DocumentTypeArg::PureAnatomy), DocumentType::PureAnatomy));
        assert!(matches!(DocumentType::from(DocumentTypeArg::SurgicalTechnique), DocumentType::SurgicalTechnique));
    }

    #[test]
    fn source_kind_arg_maps_to_every_chapter_source_kind() {
        assert!(matches!(ChapterSourceKind::from(SourceKindArg::Standalone), ChapterSourceKind::Standalone));
        assert!(matches!(ChapterSourceKind::from(SourceKindArg::Textbook), ChapterSourceKind::Textbook));
        assert!(matches!(ChapterSourceKind::from(SourceKindArg::Paper), ChapterSourceKind::Paper));
    }
}
