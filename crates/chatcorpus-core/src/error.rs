use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by corpus generation and ingestion.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Nothing has been ingested yet.
    #[error("no chat history recorded yet at {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("chat history at {} has no usable records", path.display())]
    EmptySource { path: PathBuf },

    #[error("failed to read chat history at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write corpus export to {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append message to {}: {source}", path.display())]
    IngestWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CorpusError {
    /// "No data" conditions that callers report instead of treating as failures.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            CorpusError::SourceMissing { .. } | CorpusError::EmptySource { .. }
        )
    }
}
