use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use novel_summarizer::chunker::{decode_source, SourceEncoding};
use novel_summarizer::config::{AppConfig, ChunkFailurePolicy};
use novel_summarizer::generation::GenerationHandle;
use novel_summarizer::language::Language;
use novel_summarizer::ollama::OllamaClient;
use novel_summarizer::pipeline::Summarizer;
use novel_summarizer::report::ReportWriter;

#[derive(Parser, Debug)]
#[command(name = "novel-summarizer")]
#[command(about = "Hierarchical summarization of long texts with a local Ollama model")]
struct Cli {
    /// Plain-text file to summarize.
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    /// Target language: ru or en.
    #[arg(long)]
    language: Option<Language>,
    /// Maximum chunk size in characters.
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Sentences repeated at the start of the next chunk.
    #[arg(long)]
    overlap: Option<usize>,
    #[arg(long)]
    max_group_size: Option<usize>,
    #[arg(long)]
    detail_level: Option<u32>,
    #[arg(long)]
    language_retries: Option<u32>,
    /// Per-call generation timeout; 0 disables it.
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    merge_concurrency: Option<usize>,
    /// abort, skip or placeholder.
    #[arg(long)]
    on_chunk_failure: Option<ChunkFailurePolicy>,
    /// Pass the previous chunk summary along with each chunk.
    #[arg(long, default_value_t = false)]
    carry_context: bool,
    /// Use the narrative prompt on every merge level, not only the last.
    #[arg(long, default_value_t = false)]
    narrative_every_level: bool,
    /// Only chunk the text and print statistics.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }

        let summarizer = &mut config.summarizer;
        if let Some(language) = self.language {
            summarizer.language = language;
        }
        if let Some(size) = self.chunk_size {
            summarizer.chunk_size = size;
        }
        if let Some(overlap) = self.overlap {
            summarizer.overlap_sentences = overlap;
        }
        if let Some(size) = self.max_group_size {
            summarizer.max_group_size = size;
        }
        if let Some(level) = self.detail_level {
            summarizer.detail_level = level;
        }
        if let Some(retries) = self.language_retries {
            summarizer.max_language_retry_attempts = retries;
        }
        if let Some(secs) = self.timeout_secs {
            summarizer.generation_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(concurrency) = self.merge_concurrency {
            summarizer.merge_concurrency = concurrency;
        }
        if let Some(policy) = self.on_chunk_failure {
            summarizer.on_chunk_failure = policy;
        }
        summarizer.carry_context |= self.carry_context;
        summarizer.narrative_every_level |= self.narrative_every_level;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    cli.apply(&mut config);

    let raw = read_source(&cli.input).await?;

    let client = OllamaClient::new(config.ollama_base_url.clone(), config.model.clone());
    let handle = GenerationHandle::new(Arc::new(client), config.summarizer.generation_timeout);
    let summarizer = Summarizer::new(config.summarizer.clone(), handle.clone(), config.model.clone())?;

    if cli.dry_run {
        let (text, chunks) = summarizer.prepare(&raw);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        println!(
            "chars={} chunks={} min={} max={} avg={}",
            text.chars().count(),
            chunks.len(),
            sizes.iter().min().copied().unwrap_or(0),
            sizes.iter().max().copied().unwrap_or(0),
            sizes.iter().sum::<usize>() / sizes.len().max(1)
        );
        return Ok(());
    }

    tracing::info!(
        backend = handle.backend_name(),
        model = %config.model,
        language = config.summarizer.language.code(),
        input = %cli.input.display(),
        "starting summarization"
    );
    let started = Instant::now();
    let report = summarizer
        .run(&raw, |status| {
            let level = status
                .level
                .map(|l| format!(" level={l}"))
                .unwrap_or_default();
            println!(
                "[{}] {}/{}{}",
                status.stage.as_str(),
                status.done,
                status.total,
                level
            );
        })
        .await?;
    handle.close();

    let writer = ReportWriter::new(&config.output_dir);
    let written = writer.write(&report).await?;

    println!("\n{}\n", preview(&report.overall_summary, 600));
    println!("reports: {}", writer.output_dir().display());
    println!("final summary: {}", written.final_summary.display());
    println!("elapsed: {:.1}s", started.elapsed().as_secs_f64());

    Ok(())
}

async fn read_source(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let (text, encoding) = decode_source(&bytes);
    if encoding != SourceEncoding::Utf8 {
        tracing::warn!(
            path = %path.display(),
            encoding = encoding.as_str(),
            "input is not valid UTF-8; decoded with fallback encoding"
        );
    }
    Ok(text)
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
