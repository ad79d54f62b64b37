//! Results handed back to judges: assignments and vote receipts

use serde::{Deserialize, Serialize};

use crate::models::Project;
use crate::types::{GroupId, JudgeId, ProjectId};

/// What a judge needs to find a project
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub location: i64,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            location: project.location,
        }
    }
}

/// Project to visit next, and the project to compare it against
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Assignment {
    pub judge_id: JudgeId,
    pub project: ProjectSummary,
    pub partner: Option<ProjectSummary>,
    pub group: GroupId,
}

/// Result of asking for work; only `Assigned` carries a project
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Assigned(Assignment),
    /// The judge has seen every active project
    JudgingComplete { judge_id: JudgeId },
    /// Unseen projects remain but other judges hold all of them
    ProjectsBusy { judge_id: JudgeId },
    /// Nobody is in the rotation
    NoActiveJudges,
}

impl AssignmentOutcome {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            AssignmentOutcome::Assigned(assignment) => Some(assignment),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, AssignmentOutcome::JudgingComplete { .. })
    }
}

/// Score movement of one project caused by a vote
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScoreChange {
    pub project_id: ProjectId,
    pub mu_before: f64,
    pub mu_after: f64,
    pub sigma_sq_before: f64,
    pub sigma_sq_after: f64,
}

/// Everything a single vote changed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpdatedScores {
    pub winner: ScoreChange,
    pub loser: ScoreChange,
    /// Model probability that the winner would win, before the update
    pub predicted: f64,
    pub judge_alpha: f64,
    pub judge_beta: f64,
}

/// Acknowledgement returned to the judge after voting
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoteReceipt {
    pub judge_id: JudgeId,
    pub judge_votes: i64,
    pub scores: UpdatedScores,
}
