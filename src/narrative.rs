use async_trait::async_trait;

use crate::clean::OutputCleaner;
use crate::config::{SummarizerConfig, TokenConfig};
use crate::error::GenerationError;
use crate::generation::{GenerationHandle, GenerationOptions, GenerationRequest};
use crate::language::{Enforced, Language, LanguageGuard};
use crate::merge::{Combine, MergeStep};
use crate::prompt::{condense_prompt, narrative_prompt, overview_prompt, system_message};

#[derive(Clone)]
pub struct NarrativeCombiner {
    handle: GenerationHandle,
    language: Language,
    tokens: TokenConfig,
    narrative_every_level: bool,
    max_attempts: u32,
    cleaner: OutputCleaner,
}

impl NarrativeCombiner {
    pub fn new(handle: GenerationHandle, config: &SummarizerConfig) -> Self {
        Self {
            handle,
            language: config.language,
            tokens: config.tokens.clone(),
            narrative_every_level: config.narrative_every_level,
            max_attempts: config.max_language_retry_attempts,
            cleaner: OutputCleaner,
        }
    }

    pub async fn weave(&self, texts: &[String], detail_level: u32) -> Result<String, GenerationError> {
        self.weave_at(texts, detail_level, self.tokens.temperature)
            .await
    }

    async fn weave_at(
        &self,
        texts: &[String],
        detail_level: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        if texts.is_empty() {
            return Ok(String::new());
        }
        let prompt = narrative_prompt(self.language, texts, detail_level);
        self.run(prompt, GenerationOptions::new(self.tokens.narrative_tokens, temperature))
            .await
    }

    async fn condense_at(
        &self,
        texts: &[String],
        detail_level: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let prompt = condense_prompt(self.language, texts, detail_level);
        self.run(prompt, GenerationOptions::new(self.tokens.merge_tokens, temperature))
            .await
    }

    pub async fn overview(&self, top_summary: &str) -> Result<Enforced, GenerationError> {
        let options = GenerationOptions::new(self.tokens.overview_tokens, self.tokens.temperature);
        let retry_options = options.with_temperature(self.tokens.retry_temperature);
        let prompt = overview_prompt(self.language, top_summary);

        let first = self.run(prompt.clone(), options).await?;
        let prompt = &prompt;
        let retry_options = &retry_options;
        LanguageGuard::new(self.language)
            .enforce(
                first,
                move || async move { self.run(prompt.clone(), retry_options.clone()).await },
                self.max_attempts,
            )
            .await
    }

    async fn run(
        &self,
        prompt: String,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            system: Some(system_message(self.language).to_string()),
            prompt,
            options,
        };
        let raw = self.handle.generate(&request).await?;
        Ok(self.cleaner.clean(&raw))
    }
}

#[async_trait]
impl Combine for NarrativeCombiner {
    async fn combine(&self, texts: &[String], step: MergeStep) -> Result<String, GenerationError> {
        let temperature = if step.attempt == 0 {
            self.tokens.temperature
        } else {
            self.tokens.retry_temperature
        };

        if step.is_final || self.narrative_every_level {
            self.weave_at(texts, step.detail_level, temperature).await
        } else {
            self.condense_at(texts, step.detail_level, temperature).await
        }
    }
}
