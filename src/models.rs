use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Byte offsets into the normalized text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub source_level: usize,
    pub source_indices: Vec<usize>,
    pub text: String,
    pub language_ok: bool,
    pub attempts: u32,
}

impl Summary {
    pub fn label(&self) -> String {
        match (self.source_indices.first(), self.source_indices.last()) {
            (Some(first), Some(last)) if first != last => {
                format!("level {} [chunks {}-{}]", self.source_level, first, last)
            }
            (Some(first), _) => format!("level {} [chunk {}]", self.source_level, first),
            _ => format!("level {} [empty]", self.source_level),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub level: usize,
    pub position: usize,
    pub members: Vec<Summary>,
}

impl MergeGroup {
    pub fn texts(&self) -> Vec<String> {
        self.members.iter().map(|s| s.text.clone()).collect()
    }

    pub fn source_indices(&self) -> Vec<usize> {
        self.members
            .iter()
            .flat_map(|s| s.source_indices.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceRecord {
    /// Level of the summaries consumed by this reduction step.
    pub level: usize,
    pub group_count: usize,
    pub item_count: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecursionTrace {
    records: Vec<TraceRecord>,
}

impl RecursionTrace {
    pub fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub error: String,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Chunking,
    SummarizingChunks,
    Merging,
    Overview,
    Done,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Chunking => "chunking",
            RunStage::SummarizingChunks => "summarizing_chunks",
            RunStage::Merging => "merging",
            RunStage::Overview => "overview",
            RunStage::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub stage: RunStage,
    pub done: usize,
    pub total: usize,
    pub level: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub run_id: String,
    pub model: String,
    pub language: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub source_chars: usize,
    pub chunk_count: usize,
    pub overall_summary: String,
    pub overall_language_ok: bool,
    pub overall_attempts: u32,
    pub top_summary: Summary,
    pub chunk_summaries: Vec<Summary>,
    pub levels: Vec<Vec<Summary>>,
    pub trace: RecursionTrace,
    pub chunk_failures: Vec<ChunkFailure>,
}

impl SummaryReport {
    pub fn language_failures(&self) -> Vec<&Summary> {
        self.levels
            .iter()
            .flatten()
            // Placeholders never reached the model, they are chunk failures.
            .filter(|s| !s.language_ok && s.attempts > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(level: usize, indices: Vec<usize>) -> Summary {
        Summary {
            source_level: level,
            source_indices: indices,
            text: "text".to_string(),
            language_ok: true,
            attempts: 1,
        }
    }

    #[test]
    fn merge_group_concatenates_indices_in_order() {
        let group = MergeGroup {
            level: 1,
            position: 0,
            members: vec![summary(1, vec![0, 1, 2]), summary(1, vec![3, 4])],
        };
        assert_eq!(group.source_indices(), vec![0, 1, 2, 3, 4]);
        assert_eq!(group.texts().len(), 2);
    }

    #[test]
    fn placeholders_are_not_language_failures() {
        let mut english = summary(0, vec![0]);
        english.language_ok = false;
        english.attempts = 3;
        let mut placeholder = summary(0, vec![1]);
        placeholder.language_ok = false;
        placeholder.attempts = 0;
        let top = summary(1, vec![0, 1]);

        let report = SummaryReport {
            run_id: "r".to_string(),
            model: "m".to_string(),
            language: "ru".to_string(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            source_chars: 10,
            chunk_count: 2,
            overall_summary: "Итог.".to_string(),
            overall_language_ok: true,
            overall_attempts: 1,
            top_summary: top.clone(),
            chunk_summaries: vec![english.clone(), placeholder.clone()],
            levels: vec![vec![english, placeholder], vec![top]],
            trace: RecursionTrace::default(),
            chunk_failures: Vec::new(),
        };
        let failures = report.language_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source_indices, vec![0]);
    }

    #[test]
    fn label_describes_chunk_span() {
        assert_eq!(summary(0, vec![4]).label(), "level 0 [chunk 4]");
        assert_eq!(summary(2, vec![0, 1, 2]).label(), "level 2 [chunks 0-2]");
    }
}
