//! Leaderboard and summary statistics

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, ProjectId};

/// One row of the leaderboard
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RankedProject {
    pub rank: usize,
    pub id: ProjectId,
    pub name: String,
    pub location: i64,
    pub group: GroupId,
    pub mu: f64,
    pub sigma_sq: f64,
    pub votes: i64,
    pub seen: i64,
    pub stars: i64,
}

/// Aggregate figures over the whole event
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct JudgingStats {
    pub projects: u64,
    pub avg_seen: f64,
    pub avg_votes: f64,
    pub max_mu: f64,
    pub avg_sigma: f64,
    pub judges: u64,
}
