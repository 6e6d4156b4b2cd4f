use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation backend failed: {0}")]
    Backend(String),

    #[error("generation timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("generation capability is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("input text produced no chunks to summarize")]
    EmptyInput,

    #[error("every chunk failed to summarize ({failed} skipped)")]
    AllChunksFailed { failed: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to summarize chunk {index}")]
    ChunkGeneration {
        index: usize,
        #[source]
        source: GenerationError,
    },

    #[error("failed to merge group {group} at level {level}")]
    MergeGeneration {
        level: usize,
        group: usize,
        #[source]
        source: GenerationError,
    },

    #[error("failed to produce the overall summary")]
    OverviewGeneration(#[source] GenerationError),
}

pub type Result<T> = std::result::Result<T, SummarizeError>;
