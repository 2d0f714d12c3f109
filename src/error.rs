use std::path::PathBuf;

use crate::report::FillError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("data file not found at {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("{} is missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("failed to read {}: {source:#}", path.display())]
    Unreadable {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("no teams found in dataset")]
    NoTeams,

    #[error("no matches found for {team} in the dataset")]
    NoMatches { team: String },

    #[error("report could not be filled: {0}")]
    Report(#[from] FillError),

    #[error("update failed: {detail}")]
    UpdateFailed { detail: String },
}

impl PipelineError {
    /// Whether the failure only affects the current request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoMatches { .. })
    }
}
