pub mod chunker;
pub mod clean;
pub mod config;
pub mod error;
pub mod generation;
pub mod language;
pub mod merge;
pub mod models;
pub mod narrative;
pub mod ollama;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod summarize;

pub use config::{AppConfig, ChunkFailurePolicy, SummarizerConfig};
pub use error::{GenerationError, SummarizeError};
pub use generation::{GenerationHandle, Generator};
pub use language::Language;
pub use pipeline::Summarizer;
pub use report::ReportWriter;
