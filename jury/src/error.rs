//! Engine error types

use shared::{JudgeId, ProjectId, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{key} environmental variable not defined")]
    MissingEnv { key: String },

    #[error("Judge not found: {judge_id}")]
    JudgeNotFound { judge_id: JudgeId },

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: ProjectId },

    #[error("Judge is not active: {judge_id}")]
    JudgeInactive { judge_id: JudgeId },

    #[error("Judge is not in the rotation: {judge_id}")]
    NotQueued { judge_id: JudgeId },

    #[error("Judge is already in the rotation: {judge_id}")]
    AlreadyQueued { judge_id: JudgeId },

    #[error("No active judges in the rotation")]
    EmptyQueue,

    #[error("Judge rotation corrupted during {operation} on {judge_id}: {detail}")]
    QueueCorrupted {
        judge_id: JudgeId,
        operation: &'static str,
        detail: String,
    },

    #[error("Version conflict on {entity} {id}")]
    VersionConflict { entity: &'static str, id: String },

    #[error("{operation} gave up after {attempts} conflicting attempts")]
    StaleVersion { operation: &'static str, attempts: u32 },

    #[error("Invalid comparison by {judge_id}: {winner} over {loser} ({reason})")]
    InvalidPair {
        judge_id: JudgeId,
        winner: ProjectId,
        loser: ProjectId,
        reason: &'static str,
    },

    #[error("Judge has no open comparison: {judge_id}")]
    NoActiveComparison { judge_id: JudgeId },

    #[error("Judge has seen every project: {judge_id}")]
    NoEligibleProject { judge_id: JudgeId },

    #[error("All remaining projects are held by other judges: {judge_id}")]
    ProjectsBusy { judge_id: JudgeId },

    #[error("Import rejected at line {line}: {detail}")]
    InvalidImport { line: u64, detail: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),
}

impl EngineError {
    pub fn judge_conflict(judge_id: &JudgeId) -> Self {
        EngineError::VersionConflict {
            entity: "judge",
            id: judge_id.to_string(),
        }
    }

    pub fn project_conflict(project_id: &ProjectId) -> Self {
        EngineError::VersionConflict {
            entity: "project",
            id: project_id.to_string(),
        }
    }

    pub fn queue_conflict() -> Self {
        EngineError::VersionConflict {
            entity: "queue",
            id: "head".to_string(),
        }
    }

    pub fn corrupted(judge_id: JudgeId, operation: &'static str, detail: impl Into<String>) -> Self {
        EngineError::QueueCorrupted {
            judge_id,
            operation,
            detail: detail.into(),
        }
    }

    /// Optimistic-concurrency conflicts are retried locally
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::VersionConflict { .. })
    }

    /// Corruption needs an operator; it is never retried or repaired
    pub fn is_structural(&self) -> bool {
        matches!(self, EngineError::QueueCorrupted { .. })
    }

    /// Expected "no more work" conditions
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            EngineError::EmptyQueue
                | EngineError::NoEligibleProject { .. }
                | EngineError::ProjectsBusy { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
