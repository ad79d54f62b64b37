//! Judging core
//!
//! - `queue`: round-robin rotation of active judges
//! - `groups`: which project a judge sees next
//! - `comparison`: score and reliability updates from votes
//! - `ranking`: leaderboard ordering and statistics
//! - `retry`: bounded backoff for version conflicts
//!
//! `groups` and `ranking` are pure; `queue` and `comparison` reach the stores
//! only through the traits in `crate::traits`.

pub mod comparison;
pub mod groups;
pub mod queue;
pub mod ranking;
pub mod retry;

pub use comparison::ComparisonEngine;
pub use groups::{Allocation, GroupAllocator};
pub use queue::QueueManager;
pub use ranking::RankingAggregator;
pub use retry::{retry_on_conflict, RetryPolicy};
