use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SummarizeError};
use crate::language::Language;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    Abort,
    Skip,
    Placeholder,
}

impl ChunkFailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkFailurePolicy::Abort => "abort",
            ChunkFailurePolicy::Skip => "skip",
            ChunkFailurePolicy::Placeholder => "placeholder",
        }
    }
}

impl FromStr for ChunkFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ChunkFailurePolicy::Abort),
            "skip" => Ok(ChunkFailurePolicy::Skip),
            "placeholder" => Ok(ChunkFailurePolicy::Placeholder),
            other => Err(format!(
                "unknown chunk failure policy '{other}' (expected abort, skip or placeholder)"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub chunk_summary_tokens: usize,
    pub merge_tokens: usize,
    pub narrative_tokens: usize,
    pub overview_tokens: usize,
    pub temperature: f32,
    pub retry_temperature: f32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            chunk_summary_tokens: 600,
            merge_tokens: 800,
            narrative_tokens: 8_000,
            overview_tokens: 1_600,
            temperature: 0.1,
            retry_temperature: 0.3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SummarizerConfig {
    pub language: Language,
    pub chunk_size: usize,
    pub overlap_sentences: usize,
    pub max_group_size: usize,
    pub detail_level: u32,
    pub max_language_retry_attempts: u32,
    pub generation_timeout: Option<Duration>,
    pub merge_concurrency: usize,
    pub on_chunk_failure: ChunkFailurePolicy,
    pub carry_context: bool,
    pub narrative_every_level: bool,
    pub tokens: TokenConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            language: Language::Russian,
            chunk_size: 3_000,
            overlap_sentences: 3,
            max_group_size: 5,
            detail_level: 1,
            max_language_retry_attempts: 1,
            generation_timeout: Some(Duration::from_secs(600)),
            merge_concurrency: 1,
            on_chunk_failure: ChunkFailurePolicy::Abort,
            carry_context: false,
            narrative_every_level: false,
            tokens: TokenConfig::default(),
        }
    }
}

impl SummarizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SummarizeError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.max_group_size < 2 {
            return Err(SummarizeError::InvalidConfig(format!(
                "max_group_size must be at least 2, got {}",
                self.max_group_size
            )));
        }
        if self.detail_level < 1 {
            return Err(SummarizeError::InvalidConfig(
                "detail_level must be at least 1".to_string(),
            ));
        }
        if self.merge_concurrency < 1 {
            return Err(SummarizeError::InvalidConfig(
                "merge_concurrency must be at least 1".to_string(),
            ));
        }
        if self.generation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SummarizeError::InvalidConfig(
                "generation_timeout must be positive; leave it unset to disable".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub model: String,
    pub output_dir: PathBuf,
    pub summarizer: SummarizerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SummarizerConfig::default();

        let timeout_secs: u64 = parse_env("SUMMARY_TIMEOUT_SECS").unwrap_or(600);

        Self {
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            model: env::var("SUMMARY_MODEL")
                .unwrap_or_else(|_| "qwen2.5:14b-instruct".to_string()),
            output_dir: env::var("SUMMARY_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./summary_output")),
            summarizer: SummarizerConfig {
                language: parse_env("SUMMARY_LANGUAGE").unwrap_or(defaults.language),
                chunk_size: parse_env("SUMMARY_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
                overlap_sentences: parse_env("SUMMARY_OVERLAP_SENTENCES")
                    .unwrap_or(defaults.overlap_sentences),
                max_group_size: parse_env("SUMMARY_MAX_GROUP_SIZE")
                    .unwrap_or(defaults.max_group_size),
                detail_level: parse_env("SUMMARY_DETAIL_LEVEL").unwrap_or(defaults.detail_level),
                max_language_retry_attempts: parse_env("SUMMARY_LANGUAGE_RETRIES")
                    .unwrap_or(defaults.max_language_retry_attempts),
                generation_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                merge_concurrency: parse_env("SUMMARY_MERGE_CONCURRENCY")
                    .unwrap_or(defaults.merge_concurrency),
                on_chunk_failure: parse_env("SUMMARY_ON_CHUNK_FAILURE")
                    .unwrap_or(defaults.on_chunk_failure),
                ..defaults
            },
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
