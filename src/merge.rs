use std::time::Instant;

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};

use crate::clean::OutputCleaner;
use crate::config::SummarizerConfig;
use crate::error::{GenerationError, Result, SummarizeError};
use crate::language::LanguageGuard;
use crate::models::{MergeGroup, RecursionTrace, Summary, TraceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStep {
    pub level: usize,
    pub detail_level: u32,
    pub is_final: bool,
    // 0 for the first call, then one per language retry.
    pub attempt: u32,
}

#[async_trait]
pub trait Combine: Send + Sync {
    async fn combine(
        &self,
        texts: &[String],
        step: MergeStep,
    ) -> std::result::Result<String, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub top: Summary,
    pub levels: Vec<Vec<Summary>>,
    pub trace: RecursionTrace,
}

#[derive(Debug, Clone)]
pub struct HierarchicalMerger {
    max_group_size: usize,
    detail_level: u32,
    max_attempts: u32,
    concurrency: usize,
    guard: LanguageGuard,
    cleaner: OutputCleaner,
}

impl HierarchicalMerger {
    pub fn new(config: &SummarizerConfig) -> Self {
        Self {
            max_group_size: config.max_group_size.max(2),
            detail_level: config.detail_level,
            max_attempts: config.max_language_retry_attempts,
            concurrency: config.merge_concurrency.max(1),
            guard: LanguageGuard::new(config.language),
            cleaner: OutputCleaner,
        }
    }

    pub async fn merge_all(
        &self,
        summaries: Vec<Summary>,
        combiner: &dyn Combine,
    ) -> Result<MergeOutcome> {
        self.merge_all_with_progress(summaries, combiner, |_| {})
            .await
    }

    pub async fn merge_all_with_progress<F>(
        &self,
        summaries: Vec<Summary>,
        combiner: &dyn Combine,
        mut on_level: F,
    ) -> Result<MergeOutcome>
    where
        F: FnMut(&TraceRecord),
    {
        let mut trace = RecursionTrace::default();
        let mut levels = Vec::new();
        let mut pending = summaries;

        while pending.len() > 1 {
            let started = Instant::now();
            let level = pending[0].source_level;
            let groups = partition(&pending, level, self.max_group_size);
            let group_count = groups.len();
            let is_final = group_count == 1;

            let merged: Vec<Summary> = stream::iter(groups)
                .map(|group| self.merge_group(group, is_final, combiner))
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            let record = TraceRecord {
                level,
                group_count,
                item_count: pending.len(),
                elapsed: started.elapsed(),
            };
            tracing::info!(
                level,
                groups = group_count,
                items = record.item_count,
                elapsed_ms = record.elapsed.as_millis() as u64,
                "merged summary level"
            );
            on_level(&record);
            trace.push(record);

            levels.push(std::mem::replace(&mut pending, merged));
        }

        let top = pending.pop().ok_or(SummarizeError::EmptyInput)?;
        levels.push(vec![top.clone()]);

        Ok(MergeOutcome { top, levels, trace })
    }

    async fn merge_group(
        &self,
        group: MergeGroup,
        is_final: bool,
        combiner: &dyn Combine,
    ) -> Result<Summary> {
        let step = MergeStep {
            level: group.level + 1,
            detail_level: self.detail_level,
            is_final,
            attempt: 0,
        };
        let fatal = |source: GenerationError| SummarizeError::MergeGeneration {
            level: step.level,
            group: group.position,
            source,
        };

        let texts = group.texts();
        let raw = combiner.combine(&texts, step).await.map_err(fatal)?;

        let texts = &texts;
        let cleaner = self.cleaner;
        let mut attempt = 0;
        let enforced = self
            .guard
            .enforce(
                cleaner.clean(&raw),
                move || {
                    attempt += 1;
                    let step = MergeStep { attempt, ..step };
                    async move {
                        let raw = combiner.combine(texts, step).await?;
                        Ok::<_, GenerationError>(cleaner.clean(&raw))
                    }
                },
                self.max_attempts,
            )
            .await
            .map_err(fatal)?;

        if !enforced.ok {
            tracing::warn!(
                level = step.level,
                group = group.position,
                attempts = enforced.attempts,
                "merged summary failed language correction"
            );
        }

        Ok(Summary {
            source_level: step.level,
            source_indices: group.source_indices(),
            text: enforced.text,
            language_ok: enforced.ok,
            attempts: 1 + enforced.attempts,
        })
    }
}

pub fn partition(summaries: &[Summary], level: usize, max_group_size: usize) -> Vec<MergeGroup> {
    summaries
        .chunks(max_group_size.max(1))
        .enumerate()
        .map(|(position, members)| MergeGroup {
            level,
            position,
            members: members.to_vec(),
        })
        .collect()
}
