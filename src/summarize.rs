use crate::clean::OutputCleaner;
use crate::config::SummarizerConfig;
use crate::error::GenerationError;
use crate::generation::{GenerationHandle, GenerationOptions, GenerationRequest};
use crate::language::LanguageGuard;
use crate::models::{Chunk, Summary};
use crate::prompt::{chunk_summary_prompt, system_message};

#[derive(Clone)]
pub struct ChunkSummarizer {
    handle: GenerationHandle,
    guard: LanguageGuard,
    cleaner: OutputCleaner,
    options: GenerationOptions,
    retry_temperature: f32,
    max_attempts: u32,
}

impl ChunkSummarizer {
    pub fn new(handle: GenerationHandle, config: &SummarizerConfig) -> Self {
        let mut options =
            GenerationOptions::new(config.tokens.chunk_summary_tokens, config.tokens.temperature);
        // Chunk summaries also stop on the usual reasoning openers.
        options
            .stop
            .extend(["Ok,", "So,", "First,"].iter().map(|s| s.to_string()));

        Self {
            handle,
            guard: LanguageGuard::new(config.language),
            cleaner: OutputCleaner,
            options,
            retry_temperature: config.tokens.retry_temperature,
            max_attempts: config.max_language_retry_attempts,
        }
    }

    /// Backend failures are returned as-is; the caller picks the failure
    /// policy. Language mismatches only show up in `language_ok`.
    pub async fn summarize(
        &self,
        chunk: &Chunk,
        detail_level: u32,
        previous_summary: Option<&str>,
    ) -> Result<Summary, GenerationError> {
        let language = self.guard.language();
        let request = GenerationRequest {
            system: Some(system_message(language).to_string()),
            prompt: chunk_summary_prompt(language, &chunk.text, detail_level, previous_summary),
            options: self.options.clone(),
        };

        let raw = self.handle.generate(&request).await?;
        let first = self.cleaner.clean(&raw);

        let retry = GenerationRequest {
            options: request.options.with_temperature(self.retry_temperature),
            ..request
        };
        let handle = &self.handle;
        let retry = &retry;
        let cleaner = self.cleaner;
        let enforced = self
            .guard
            .enforce(
                first,
                move || async move {
                    let raw = handle.generate(retry).await?;
                    Ok::<_, GenerationError>(cleaner.clean(&raw))
                },
                self.max_attempts,
            )
            .await?;

        if !enforced.ok {
            tracing::warn!(
                chunk = chunk.index,
                attempts = enforced.attempts,
                "chunk summary failed language correction"
            );
        }

        Ok(Summary {
            source_level: 0,
            source_indices: vec![chunk.index],
            text: enforced.text,
            language_ok: enforced.ok,
            attempts: 1 + enforced.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::generation::testing::{handle, ScriptedGenerator};
    use crate::language::Language;

    const RUSSIAN: &str = "Воланд прибывает в Москву и встречает Берлиоза на Патриарших прудах.";
    const ENGLISH: &str = "Woland arrives in Moscow and meets Berlioz at the Patriarch Ponds.";

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            text: "Однажды весною, в час небывало жаркого заката, в Москве появились двое граждан."
                .to_string(),
            start_offset: 0,
            end_offset: 10,
        }
    }

    fn config(retries: u32) -> SummarizerConfig {
        SummarizerConfig {
            language: Language::Russian,
            max_language_retry_attempts: retries,
            ..SummarizerConfig::default()
        }
    }

    #[tokio::test]
    async fn cleans_output_and_records_chunk_index() {
        let generator = Arc::new(ScriptedGenerator::constant(&format!(
            "<think>plan the answer</think>{RUSSIAN}"
        )));
        let summarizer = ChunkSummarizer::new(handle(generator.clone()), &config(2));

        let summary = summarizer.summarize(&chunk(3), 1, None).await.unwrap();
        assert_eq!(summary.text, RUSSIAN);
        assert_eq!(summary.source_level, 0);
        assert_eq!(summary.source_indices, vec![3]);
        assert!(summary.language_ok);
        assert_eq!(summary.attempts, 1);

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("небывало жаркого заката"));
        assert!(requests[0].system.as_deref().unwrap().contains("русском"));
        assert_eq!(requests[0].options.max_tokens, 600);
    }

    #[tokio::test]
    async fn regenerates_with_same_prompt_at_retry_temperature() {
        let generator = Arc::new(
            ScriptedGenerator::constant(RUSSIAN).with_queue([Ok(ENGLISH.to_string())]),
        );
        let summarizer = ChunkSummarizer::new(handle(generator.clone()), &config(2));

        let summary = summarizer.summarize(&chunk(0), 1, None).await.unwrap();
        assert_eq!(summary.text, RUSSIAN);
        assert!(summary.language_ok);
        assert_eq!(summary.attempts, 2);

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].prompt, requests[1].prompt);
        assert!((requests[1].options.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn exhausted_retries_are_a_soft_failure() {
        let generator = Arc::new(ScriptedGenerator::constant(ENGLISH));
        let summarizer = ChunkSummarizer::new(handle(generator.clone()), &config(2));

        let summary = summarizer.summarize(&chunk(1), 1, None).await.unwrap();
        assert!(!summary.language_ok);
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.text, ENGLISH);
        assert_eq!(generator.request_count(), 3);
    }

    #[tokio::test]
    async fn backend_failure_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::failing());
        let summarizer = ChunkSummarizer::new(handle(generator.clone()), &config(3));

        let err = summarizer.summarize(&chunk(0), 1, None).await.unwrap_err();
        assert!(matches!(err, GenerationError::Backend(_)));
        assert_eq!(generator.request_count(), 1);
    }

    #[tokio::test]
    async fn previous_summary_is_passed_as_context() {
        let generator = Arc::new(ScriptedGenerator::constant(RUSSIAN));
        let summarizer = ChunkSummarizer::new(handle(generator.clone()), &config(0));

        summarizer
            .summarize(&chunk(1), 2, Some("Берлиоз погибает под трамваем."))
            .await
            .unwrap();
        let prompt = &generator.requests()[0].prompt;
        assert!(prompt.contains("Берлиоз погибает под трамваем."));
        assert!(prompt.contains("Уровень детализации: 2"));
    }
}
