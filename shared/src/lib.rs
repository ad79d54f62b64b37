//! Shared types for the jury judging system
//!
//! Records, identifiers and result messages used by the engine and by
//! anything that talks to it, plus the common logging setup.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod models;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{
    // Judge-facing results
    Assignment, AssignmentOutcome, ProjectSummary, ScoreChange, UpdatedScores, VoteReceipt,

    // Leaderboard
    JudgingStats, RankedProject,
};

pub use models::{
    ComparisonContext, Flag, GroupLayout, Judge, JudgedProject, NewJudge, NewProject, Project,
    ProjectLease, ReliabilityPrior, ScorePrior, TableRange,
};
