//! Domain records shared by the engine and its collaborators
//!
//! - `judge`: judges, their seen list and comparison context
//! - `project`: projects, score priors, leases and flags
//! - `layout`: table-range grouping of projects

pub mod judge;
pub mod layout;
pub mod project;

pub use judge::{ComparisonContext, Judge, JudgedProject, NewJudge, ReliabilityPrior};
pub use layout::{GroupLayout, TableRange};
pub use project::{Flag, NewProject, Project, ProjectLease, ScorePrior};
