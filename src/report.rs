use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{Summary, SummaryReport};

pub const FINAL_FILE: &str = "summary_final.txt";
pub const DETAILED_FILE: &str = "summary_detailed.txt";
pub const TECHNICAL_FILE: &str = "summary_technical.log";
pub const JSON_FILE: &str = "summary_report.json";

#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub final_summary: PathBuf,
    pub detailed: PathBuf,
    pub technical: PathBuf,
    pub json: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn write(&self, report: &SummaryReport) -> Result<WrittenReport> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let written = WrittenReport {
            final_summary: self.output_dir.join(FINAL_FILE),
            detailed: self.output_dir.join(DETAILED_FILE),
            technical: self.output_dir.join(TECHNICAL_FILE),
            json: self.output_dir.join(JSON_FILE),
        };

        let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        for (path, contents) in [
            (&written.final_summary, render_final(report)),
            (&written.detailed, render_detailed(report)),
            (&written.technical, render_technical(report)),
            (&written.json, json),
        ] {
            tokio::fs::write(path, contents)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        tracing::info!(
            run_id = %report.run_id,
            dir = %self.output_dir.display(),
            "report written"
        );
        Ok(written)
    }
}

pub fn render_final(report: &SummaryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== OVERALL SUMMARY ===\n");
    let _ = writeln!(out, "{}\n", report.overall_summary);
    if !report.overall_language_ok {
        let _ = writeln!(
            out,
            "(overall summary failed language detection after {} attempts)\n",
            report.overall_attempts
        );
    }

    let _ = writeln!(out, "=== HIERARCHICAL SUMMARY ({}) ===\n", report.top_summary.label());
    let _ = writeln!(out, "{}\n", report.top_summary.text);

    let _ = writeln!(out, "=== CHUNK SUMMARIES ===\n");
    for summary in &report.chunk_summaries {
        let _ = writeln!(out, "--- {} ---\n{}\n", summary.label(), summary.text);
    }

    if !report.chunk_failures.is_empty() {
        let _ = writeln!(out, "=== CHUNK FAILURES ===\n");
        for failure in &report.chunk_failures {
            let action = if failure.placeholder { "placeholder" } else { "skipped" };
            let _ = writeln!(out, "chunk {} ({action}): {}", failure.index, failure.error);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "=== LANGUAGE CORRECTION ===\n");
    let failures = report.language_failures();
    if failures.is_empty() && report.overall_language_ok {
        let _ = writeln!(
            out,
            "All summaries passed language detection (target: {}).",
            report.language
        );
    } else {
        for summary in failures {
            let _ = writeln!(
                out,
                "{}: failed after {} attempts",
                summary.label(),
                summary.attempts
            );
        }
        if !report.overall_language_ok {
            let _ = writeln!(
                out,
                "overall summary: failed after {} attempts",
                report.overall_attempts
            );
        }
    }

    out
}

pub fn render_detailed(report: &SummaryReport) -> String {
    let mut out = String::new();
    for (level, summaries) in report.levels.iter().enumerate() {
        let _ = writeln!(out, "=== LEVEL {level} ({} summaries) ===\n", summaries.len());
        for summary in summaries {
            write_summary(&mut out, summary);
        }
    }
    out
}

fn write_summary(out: &mut String, summary: &Summary) {
    let flag = match (summary.language_ok, summary.attempts) {
        (true, _) => "",
        (false, 0) => " [placeholder]",
        (false, _) => " [language check failed]",
    };
    let _ = writeln!(out, "--- {}{flag} ---\n{}\n", summary.label(), summary.text);
}

pub fn render_technical(report: &SummaryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run_id: {}", report.run_id);
    let _ = writeln!(out, "started_at: {}", report.started_at.to_rfc3339());
    let _ = writeln!(out, "model: {}", report.model);
    let _ = writeln!(out, "language: {}", report.language);
    let _ = writeln!(out, "elapsed_secs: {:.1}", report.elapsed.as_secs_f64());
    let _ = writeln!(out, "source_chars: {}", report.source_chars);
    let _ = writeln!(out, "chunks: {}", report.chunk_count);
    let _ = writeln!(out, "levels: {}", report.levels.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "[merge trace]");
    for record in report.trace.records() {
        let _ = writeln!(
            out,
            "level {}: {} items -> {} groups in {:.1}s",
            record.level,
            record.item_count,
            record.group_count,
            record.elapsed.as_secs_f64()
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "[summaries]");
    for summary in report.levels.iter().flatten() {
        let _ = writeln!(
            out,
            "{}: attempts={} language_ok={} chars={}",
            summary.label(),
            summary.attempts,
            summary.language_ok,
            summary.text.chars().count()
        );
    }
    let _ = writeln!(
        out,
        "overall: attempts={} language_ok={} chars={}",
        report.overall_attempts,
        report.overall_language_ok,
        report.overall_summary.chars().count()
    );

    if !report.chunk_failures.is_empty() {
        let _ = writeln!(out, "\n[chunk failures]");
        for failure in &report.chunk_failures {
            let action = if failure.placeholder { "placeholder" } else { "skipped" };
            let _ = writeln!(out, "chunk {} ({action}): {}", failure.index, failure.error);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::models::{ChunkFailure, RecursionTrace, TraceRecord};

    fn summary(level: usize, indices: Vec<usize>, text: &str, language_ok: bool) -> Summary {
        Summary {
            source_level: level,
            source_indices: indices,
            text: text.to_string(),
            language_ok,
            attempts: if language_ok { 1 } else { 3 },
        }
    }

    fn report() -> SummaryReport {
        let chunks = vec![
            summary(0, vec![0], "Первая глава.", true),
            summary(0, vec![1], "Chapter two in English.", false),
            summary(0, vec![2], "Третья глава.", true),
        ];
        let top = summary(1, vec![0, 1, 2], "Вся книга.", true);
        let mut trace = RecursionTrace::default();
        trace.push(TraceRecord {
            level: 0,
            group_count: 1,
            item_count: 3,
            elapsed: Duration::from_millis(1500),
        });

        SummaryReport {
            run_id: "run-1".to_string(),
            model: "test-model".to_string(),
            language: "ru".to_string(),
            started_at: Utc::now(),
            elapsed: Duration::from_secs(42),
            source_chars: 9_000,
            chunk_count: 3,
            overall_summary: "Общая сводка романа.".to_string(),
            overall_language_ok: true,
            overall_attempts: 1,
            top_summary: top.clone(),
            chunk_summaries: chunks.clone(),
            levels: vec![chunks, vec![top]],
            trace,
            chunk_failures: vec![ChunkFailure {
                index: 3,
                error: "generation timed out after 600s".to_string(),
                placeholder: false,
            }],
        }
    }

    #[test]
    fn final_report_lists_language_failures() {
        let text = render_final(&report());
        assert!(text.starts_with("=== OVERALL SUMMARY ==="));
        assert!(text.contains("Общая сводка романа."));
        assert!(text.contains("Вся книга."));
        assert!(text.contains("level 0 [chunk 1]: failed after 3 attempts"));
        assert!(!text.contains("All summaries passed"));
    }

    #[test]
    fn placeholders_are_reported_as_chunk_failures() {
        let mut with_placeholder = report();
        let placeholder = Summary {
            attempts: 0,
            ..summary(0, vec![1], "[Фрагмент 2 не удалось пересказать.]", false)
        };
        with_placeholder.levels[0][1] = placeholder.clone();
        with_placeholder.chunk_summaries[1] = placeholder;
        with_placeholder.chunk_failures = vec![ChunkFailure {
            index: 1,
            error: "generation backend failed: oom".to_string(),
            placeholder: true,
        }];

        let text = render_final(&with_placeholder);
        assert!(!text.contains("failed after 0 attempts"));
        assert!(text.contains("chunk 1 (placeholder): generation backend failed: oom"));
        assert!(text.contains("All summaries passed language detection (target: ru)."));
        let correction = text.find("=== LANGUAGE CORRECTION ===").unwrap();
        assert!(text.find("=== CHUNK FAILURES ===").unwrap() < correction);

        let detailed = render_detailed(&with_placeholder);
        assert!(detailed.contains("level 0 [chunk 1] [placeholder]"));
    }

    #[test]
    fn final_report_states_clean_language_run() {
        let mut clean = report();
        for level in &mut clean.levels {
            for summary in level {
                summary.language_ok = true;
            }
        }
        let text = render_final(&clean);
        assert!(text.contains("All summaries passed language detection (target: ru)."));
    }

    #[test]
    fn detailed_report_keeps_group_order() {
        let text = render_detailed(&report());
        let first = text.find("Первая глава.").unwrap();
        let second = text.find("Chapter two in English.").unwrap();
        let third = text.find("Третья глава.").unwrap();
        assert!(first < second && second < third);
        assert!(text.contains("=== LEVEL 1 (1 summaries) ==="));
        assert!(text.contains("level 0 [chunk 1] [language check failed]"));
    }

    #[test]
    fn technical_log_has_trace_and_failures() {
        let text = render_technical(&report());
        assert!(text.contains("run_id: run-1"));
        assert!(text.contains("level 0: 3 items -> 1 groups in 1.5s"));
        assert!(text.contains("level 1 [chunks 0-2]: attempts=1 language_ok=true"));
        assert!(text.contains("chunk 3 (skipped): generation timed out after 600s"));
    }

    #[tokio::test]
    async fn writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("out"));

        let written = writer.write(&report()).await.unwrap();

        let final_text = std::fs::read_to_string(&written.final_summary).unwrap();
        assert!(final_text.contains("Общая сводка романа."));
        assert!(written.detailed.exists());
        assert!(written.technical.exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written.json).unwrap()).unwrap();
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["levels"].as_array().unwrap().len(), 2);
    }
}
