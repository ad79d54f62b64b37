//! Project records, leases and flags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};
use crate::models::judge::JudgedProject;
use crate::types::{FlagReason, GroupId, JudgeId, ProjectId};

/// Gaussian prior for a project's latent quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePrior {
    pub mu: f64,
    pub sigma_sq: f64,
}

impl Default for ScorePrior {
    fn default() -> Self {
        Self {
            mu: 0.0,
            sigma_sq: 1.0,
        }
    }
}

impl ScorePrior {
    pub fn validate(&self) -> SharedResult<()> {
        if !self.mu.is_finite() {
            return Err(SharedError::invalid_config("mu_prior", self.mu));
        }
        if !(self.sigma_sq.is_finite() && self.sigma_sq > 0.0) {
            return Err(SharedError::invalid_config("sigma_sq_prior", self.sigma_sq));
        }
        Ok(())
    }
}

/// Fields supplied when a project is registered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub try_link: Option<String>,
    #[serde(default)]
    pub video_link: Option<String>,
    #[serde(default)]
    pub challenge_list: Vec<String>,
}

/// Exclusive hold on a project while one judge is at its table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLease {
    pub holder: JudgeId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl ProjectLease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Table number
    pub location: i64,
    pub group: GroupId,
    pub description: String,
    #[serde(default)]
    pub try_link: Option<String>,
    #[serde(default)]
    pub video_link: Option<String>,
    #[serde(default)]
    pub challenge_list: Vec<String>,
    pub seen: i64,
    pub votes: i64,
    pub stars: i64,
    pub mu: f64,
    pub sigma_sq: f64,
    pub active: bool,
    pub prioritized: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<ProjectLease>,
}

impl Project {
    pub fn new(
        details: NewProject,
        location: i64,
        group: GroupId,
        prior: &ScorePrior,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: details.name,
            location,
            group,
            description: details.description,
            try_link: details.try_link,
            video_link: details.video_link,
            challenge_list: details.challenge_list,
            seen: 0,
            votes: 0,
            stars: 0,
            mu: prior.mu,
            sigma_sq: prior.sigma_sq,
            active: true,
            prioritized: false,
            last_activity: now,
            lease: None,
        }
    }

    /// True when another judge holds an unexpired lease
    pub fn is_leased_to_other(&self, judge: &JudgeId, now: DateTime<Utc>) -> bool {
        self.lease
            .as_ref()
            .map(|lease| lease.holder != *judge && !lease.is_expired(now))
            .unwrap_or(false)
    }

    pub fn is_held_by(&self, judge: &JudgeId) -> bool {
        self.lease.as_ref().map(|lease| lease.holder == *judge).unwrap_or(false)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma_sq.sqrt()
    }

    pub fn summary(&self) -> JudgedProject {
        JudgedProject {
            project_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            stars: 0,
        }
    }
}

/// A judge's report about a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub id: Uuid,
    pub judge_id: JudgeId,
    pub project_id: ProjectId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub reason: FlagReason,
}

impl Flag {
    pub fn new(judge_id: JudgeId, project_id: ProjectId, reason: FlagReason, time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            judge_id,
            project_id,
            time,
            reason,
        }
    }
}
