use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use triage_common::error::{TriageError, TriageResult};
use triage_scoring::{BatchSummary, ConversationSample, ScoredConversation};

pub const ERROR_ANALYSIS_FILE: &str = "error_analysis.json";
pub const SAMPLES_FILE: &str = "conversation_samples.json";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Serialize)]
struct ErrorAnalysis<'a> {
    summary: &'a BatchSummary,
    results: &'a [ScoredConversation],
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> TriageResult<PathBuf> {
    let path = dir.join(name);
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| TriageError::Internal(format!("cannot serialize {name}: {e}")))?;
    fs::write(&path, body)
        .map_err(|e| TriageError::Io(format!("cannot write {}: {e}", path.display())))?;
    Ok(path)
}

/// Write the run artifacts into `dir`, creating it if needed.
pub fn write_outputs(
    dir: &Path,
    records: &[ScoredConversation],
    summary: &BatchSummary,
    samples: &[ConversationSample],
) -> TriageResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .map_err(|e| TriageError::Io(format!("cannot create {}: {e}", dir.display())))?;

    let written = vec![
        write_json(dir, ERROR_ANALYSIS_FILE, &ErrorAnalysis { summary, results: records })?,
        write_json(dir, SAMPLES_FILE, &samples)?,
        write_json(dir, SUMMARY_FILE, summary)?,
    ];

    for path in &written {
        tracing::info!(path = %path.display(), "wrote output");
    }
    Ok(written)
}
