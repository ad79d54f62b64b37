//! Judge records and their JSON contract
//!
//! `last_activity` and every other timestamp travel as integer milliseconds
//! since the Unix epoch. Unset identifiers are left out of the encoded form.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{GroupId, JudgeId, ProjectId};

/// Beta-distribution prior for a judge's reliability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for ReliabilityPrior {
    fn default() -> Self {
        Self {
            alpha: 10.0,
            beta: 1.0,
        }
    }
}

impl ReliabilityPrior {
    pub fn validate(&self) -> SharedResult<()> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(SharedError::invalid_config("alpha_prior", self.alpha));
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(SharedError::invalid_config("beta_prior", self.beta));
        }
        Ok(())
    }
}

/// Fields supplied when a judge is registered
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJudge {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub notes: String,
}

/// Summary of a project a judge has been shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgedProject {
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub stars: i64,
}

/// The pair a judge is currently asked to compare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonContext {
    pub current: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<ProjectId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub assigned_at: DateTime<Utc>,
}

impl ComparisonContext {
    /// True when `{winner, loser}` is exactly `{current, partner}`
    pub fn matches_pair(&self, winner: &ProjectId, loser: &ProjectId) -> bool {
        match self.partner {
            Some(partner) => {
                (self.current == *winner && partner == *loser)
                    || (self.current == *loser && partner == *winner)
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judge {
    #[serde(default, skip_serializing_if = "JudgeId::is_nil")]
    pub id: JudgeId,
    pub token: String,
    pub code: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub read_welcome: bool,
    pub notes: String,
    pub votes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<JudgeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<JudgeId>,
    pub alpha: f64,
    pub beta: f64,
    pub seen_projects: Vec<JudgedProject>,
    pub visited_groups: Vec<GroupId>,
    pub current_group_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonContext>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,
}

impl Judge {
    /// Create an inactive, unlinked judge seeded with the given reliability prior
    pub fn new(profile: NewJudge, prior: &ReliabilityPrior) -> Self {
        Self {
            id: JudgeId::new(),
            token: String::new(),
            code: Self::generate_code(),
            name: profile.name,
            email: profile.email,
            active: false,
            read_welcome: false,
            notes: profile.notes,
            votes: 0,
            next: None,
            prev: None,
            alpha: prior.alpha,
            beta: prior.beta,
            seen_projects: Vec::new(),
            visited_groups: Vec::new(),
            current_group_count: 0,
            comparison: None,
            last_activity: DateTime::<Utc>::default(),
        }
    }

    /// Six digit login code between 100000 and 999999
    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(100_000..1_000_000).to_string()
    }

    /// Whether the judge currently sits in the rotation cycle
    pub fn is_linked(&self) -> bool {
        self.next.is_some() || self.prev.is_some()
    }

    pub fn has_seen(&self, project_id: &ProjectId) -> bool {
        self.seen_projects.iter().any(|p| p.project_id == *project_id)
    }

    pub fn last_seen(&self) -> Option<&JudgedProject> {
        self.seen_projects.last()
    }

    /// Append to the seen list, refusing duplicates
    pub fn record_seen(&mut self, project: JudgedProject) -> bool {
        if self.has_seen(&project.project_id) {
            return false;
        }
        self.seen_projects.push(project);
        true
    }

    /// Mark a group as visited; the list behaves as a set
    pub fn visit_group(&mut self, group: GroupId) {
        if !self.visited_groups.contains(&group) {
            self.visited_groups.push(group);
        }
    }

    pub fn has_visited(&self, group: &GroupId) -> bool {
        self.visited_groups.contains(group)
    }

    /// Expected probability that this judge's votes are informative
    pub fn reliability(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_activity > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_judge() -> Judge {
        let mut judge = Judge::new(
            NewJudge {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                notes: "table captain".to_string(),
            },
            &ReliabilityPrior::default(),
        );
        judge.last_activity = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        judge
    }

    #[test]
    fn test_last_activity_round_trips_as_integer() {
        let judge = sample_judge();
        let value = serde_json::to_value(&judge).unwrap();

        assert_eq!(value["last_activity"], serde_json::json!(1_700_000_000_000i64));
        assert!(value["last_activity"].is_i64());

        let decoded: Judge = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.last_activity.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(decoded, judge);
    }

    #[test]
    fn test_unset_identifiers_are_omitted() {
        let mut judge = sample_judge();
        judge.id = JudgeId::nil();
        let value = serde_json::to_value(&judge).unwrap();
        let object = value.as_object().unwrap();

        assert!(!object.contains_key("id"));
        assert!(!object.contains_key("next"));
        assert!(!object.contains_key("prev"));
        assert!(!object.contains_key("comparison"));
        assert!(object.contains_key("seen_projects"));

        let decoded: Judge = serde_json::from_value(value).unwrap();
        assert!(decoded.id.is_nil());
        assert!(decoded.next.is_none());
    }

    #[test]
    fn test_linked_identifiers_are_emitted() {
        let mut judge = sample_judge();
        let other = JudgeId::new();
        judge.next = Some(other);
        judge.prev = Some(other);
        let value = serde_json::to_value(&judge).unwrap();

        assert_eq!(value["next"], serde_json::json!(other.to_string()));
        assert_eq!(value["id"], serde_json::json!(judge.id.to_string()));
    }

    #[test]
    fn test_decode_from_wire_literal() {
        let raw = r#"{
            "token": "", "code": "123456", "name": "Grace", "email": "g@example.com",
            "active": true, "read_welcome": false, "notes": "", "votes": 3,
            "alpha": 10.0, "beta": 1.0, "seen_projects": [], "visited_groups": [2],
            "current_group_count": 1, "last_activity": 1700000000000
        }"#;
        let judge: Judge = serde_json::from_str(raw).unwrap();
        assert_eq!(judge.last_activity.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(judge.visited_groups, vec![GroupId(2)]);
        assert!(judge.id.is_nil());
    }

    #[test]
    fn test_new_judge_uses_injected_prior() {
        let prior = ReliabilityPrior { alpha: 3.0, beta: 2.0 };
        let judge = Judge::new(NewJudge::default(), &prior);
        assert_eq!(judge.alpha, 3.0);
        assert_eq!(judge.beta, 2.0);
        assert!((judge.reliability() - 0.6).abs() < 1e-12);
        let code: u32 = judge.code.parse().unwrap();
        assert!((100_000..1_000_000).contains(&code));
        assert!(!judge.is_linked());
    }

    #[test]
    fn test_seen_projects_reject_duplicates() {
        let mut judge = sample_judge();
        let project = JudgedProject {
            project_id: ProjectId::new(),
            name: "Widget".to_string(),
            description: String::new(),
            stars: 0,
        };
        assert!(judge.record_seen(project.clone()));
        assert!(!judge.record_seen(project));
        assert_eq!(judge.seen_projects.len(), 1);
    }

    #[test]
    fn test_prior_validation() {
        assert!(ReliabilityPrior { alpha: 0.0, beta: 1.0 }.validate().is_err());
        assert!(ReliabilityPrior { alpha: 1.0, beta: f64::NAN }.validate().is_err());
        assert!(ReliabilityPrior::default().validate().is_ok());
    }

    #[test]
    fn test_comparison_context_pair_matching() {
        let a = ProjectId::new();
        let b = ProjectId::new();
        let ctx = ComparisonContext {
            current: a,
            partner: Some(b),
            assigned_at: Utc::now(),
        };
        assert!(ctx.matches_pair(&a, &b));
        assert!(ctx.matches_pair(&b, &a));
        assert!(!ctx.matches_pair(&a, &ProjectId::new()));

        let lone = ComparisonContext { partner: None, ..ctx };
        assert!(!lone.matches_pair(&a, &b));
    }
}
