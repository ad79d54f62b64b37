//! Message types exchanged with callers of the engine
//!
//! - `assignment`: work handed to judges and vote receipts
//! - `ranking`: leaderboard rows and event statistics

pub mod assignment;
pub mod ranking;

pub use assignment::{
    Assignment, AssignmentOutcome, ProjectSummary, ScoreChange, UpdatedScores, VoteReceipt,
};

pub use ranking::{JudgingStats, RankedProject};
