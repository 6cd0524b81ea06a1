//! Error taxonomy for the co-design controller.

use std::path::PathBuf;

use crate::controller::RoundPhase;

/// Errors produced while running stages, selecting candidates and
/// extracting templates.
#[derive(Debug, thiserror::Error)]
pub enum CodesignError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("{job} exited with status {exit_code:?}")]
    JobFailed {
        job: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("failed to launch {program}: {source}")]
    JobSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("result log {} does not exist", .0.display())]
    LogNotFound(PathBuf),

    #[error("result log {} contains no selectable records", .0.display())]
    LogEmpty(PathBuf),

    #[error("malformed record in {} at line {line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("template source {} does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("round {round} failed during {phase}: {source}")]
    Round {
        round: u32,
        phase: RoundPhase,
        #[source]
        source: Box<CodesignError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodesignError {
    /// Attach the round index and controller phase to an error.
    pub fn in_round(self, round: u32, phase: RoundPhase) -> Self {
        CodesignError::Round {
            round,
            phase,
            source: Box::new(self),
        }
    }

    /// The underlying error with any round context stripped.
    pub fn root(&self) -> &CodesignError {
        match self {
            CodesignError::Round { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, CodesignError>;
