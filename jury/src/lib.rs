//! Jury judging engine
//!
//! Hands projects to judges for pairwise comparison in a fair round-robin
//! rotation, spreads each judge across table groups, and folds the votes into
//! a Bayesian ranking while learning how reliable each judge is.

pub mod config;
pub mod core;
pub mod error;
pub mod import;
pub mod judging;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{EngineConfig, JurySettings, ScoringConfig};
pub use core::{
    Allocation, ComparisonEngine, GroupAllocator, QueueManager, RankingAggregator, RetryPolicy,
};
pub use error::{EngineError, EngineResult};
pub use import::{parse_devpost, parse_judges, DevpostImport};
pub use judging::JudgingService;
pub use traits::{Clock, EnvSource, JudgeStore, ProjectStore};
