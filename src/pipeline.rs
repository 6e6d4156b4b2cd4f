use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::chunker::{chunk_text, normalize_source};
use crate::config::{ChunkFailurePolicy, SummarizerConfig};
use crate::error::{Result, SummarizeError};
use crate::generation::GenerationHandle;
use crate::merge::HierarchicalMerger;
use crate::models::{Chunk, ChunkFailure, RunStage, RunStatus, Summary, SummaryReport};
use crate::narrative::NarrativeCombiner;
use crate::prompt::placeholder_text;
use crate::summarize::ChunkSummarizer;

#[derive(Clone)]
pub struct Summarizer {
    config: SummarizerConfig,
    model: String,
    chunk_summarizer: ChunkSummarizer,
    merger: HierarchicalMerger,
    combiner: NarrativeCombiner,
}

impl Summarizer {
    pub fn new(
        config: SummarizerConfig,
        handle: GenerationHandle,
        model: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_summarizer: ChunkSummarizer::new(handle.clone(), &config),
            merger: HierarchicalMerger::new(&config),
            combiner: NarrativeCombiner::new(handle, &config),
            model: model.into(),
            config,
        })
    }

    pub fn prepare(&self, raw_text: &str) -> (String, Vec<Chunk>) {
        let text = normalize_source(raw_text);
        let chunks = chunk_text(&text, self.config.chunk_size, self.config.overlap_sentences);
        (text, chunks)
    }

    pub async fn run<F>(&self, raw_text: &str, mut progress: F) -> Result<SummaryReport>
    where
        F: FnMut(RunStatus) + Send,
    {
        let started_at = Utc::now();
        let started = Instant::now();

        progress(RunStatus {
            stage: RunStage::Chunking,
            done: 0,
            total: 0,
            level: None,
        });
        let (text, chunks) = self.prepare(raw_text);
        if chunks.is_empty() {
            return Err(SummarizeError::EmptyInput);
        }
        tracing::info!(
            chars = text.chars().count(),
            chunks = chunks.len(),
            "text split into chunks"
        );

        let (chunk_summaries, chunk_failures) =
            self.summarize_chunks(&chunks, &mut progress).await?;
        if chunk_summaries.is_empty() {
            return Err(SummarizeError::AllChunksFailed {
                failed: chunk_failures.len(),
            });
        }

        let total_items = chunk_summaries.len();
        progress(RunStatus {
            stage: RunStage::Merging,
            done: 0,
            total: total_items,
            level: Some(0),
        });
        let outcome = self
            .merger
            .merge_all_with_progress(chunk_summaries.clone(), &self.combiner, |record| {
                progress(RunStatus {
                    stage: RunStage::Merging,
                    done: record.group_count,
                    total: record.item_count,
                    level: Some(record.level + 1),
                })
            })
            .await?;

        progress(RunStatus {
            stage: RunStage::Overview,
            done: 0,
            total: 1,
            level: Some(outcome.top.source_level),
        });
        let overview = self
            .combiner
            .overview(&outcome.top.text)
            .await
            .map_err(SummarizeError::OverviewGeneration)?;

        let report = SummaryReport {
            run_id: Uuid::new_v4().to_string(),
            model: self.model.clone(),
            language: self.config.language.code().to_string(),
            started_at,
            elapsed: started.elapsed(),
            source_chars: text.chars().count(),
            chunk_count: chunks.len(),
            overall_summary: overview.text,
            overall_language_ok: overview.ok,
            overall_attempts: 1 + overview.attempts,
            top_summary: outcome.top,
            chunk_summaries,
            levels: outcome.levels,
            trace: outcome.trace,
            chunk_failures,
        };

        progress(RunStatus {
            stage: RunStage::Done,
            done: 1,
            total: 1,
            level: Some(report.top_summary.source_level),
        });
        tracing::info!(
            run_id = %report.run_id,
            elapsed_secs = report.elapsed.as_secs_f32(),
            language_failures = report.language_failures().len(),
            "summarization finished"
        );

        Ok(report)
    }

    async fn summarize_chunks<F>(
        &self,
        chunks: &[Chunk],
        progress: &mut F,
    ) -> Result<(Vec<Summary>, Vec<ChunkFailure>)>
    where
        F: FnMut(RunStatus) + Send,
    {
        let mut summaries: Vec<Summary> = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for chunk in chunks {
            progress(RunStatus {
                stage: RunStage::SummarizingChunks,
                done: chunk.index,
                total: chunks.len(),
                level: Some(0),
            });

            let previous = if self.config.carry_context {
                summaries
                    .last()
                    .filter(|s| s.language_ok)
                    .map(|s| s.text.as_str())
            } else {
                None
            };

            match self
                .chunk_summarizer
                .summarize(chunk, self.config.detail_level, previous)
                .await
            {
                Ok(summary) => {
                    tracing::info!(
                        chunk = chunk.index + 1,
                        total = chunks.len(),
                        chars = summary.text.chars().count(),
                        "chunk summarized"
                    );
                    summaries.push(summary);
                }
                Err(err) => match self.config.on_chunk_failure {
                    ChunkFailurePolicy::Abort => {
                        return Err(SummarizeError::ChunkGeneration {
                            index: chunk.index,
                            source: err,
                        });
                    }
                    policy => {
                        tracing::warn!(
                            chunk = chunk.index,
                            policy = policy.as_str(),
                            error = %err,
                            "chunk summarization failed"
                        );
                        let placeholder = policy == ChunkFailurePolicy::Placeholder;
                        if placeholder {
                            summaries.push(Summary {
                                source_level: 0,
                                source_indices: vec![chunk.index],
                                text: placeholder_text(self.config.language, chunk.index),
                                language_ok: false,
                                attempts: 0,
                            });
                        }
                        failures.push(ChunkFailure {
                            index: chunk.index,
                            error: err.to_string(),
                            placeholder,
                        });
                    }
                },
            }
        }

        progress(RunStatus {
            stage: RunStage::SummarizingChunks,
            done: chunks.len(),
            total: chunks.len(),
            level: Some(0),
        });

        Ok((summaries, failures))
    }
}
