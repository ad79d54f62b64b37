//! Project selection across table groups
//!
//! A judge works through one group at a time. After `quota` follow-up
//! assignments in a group, or once nothing is left there, the judge moves to
//! the least-covered group it has not visited yet.

use chrono::{DateTime, Utc};
use shared::{GroupId, Judge, Project, ProjectId};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// What the allocator picked for one assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub project: ProjectId,
    /// Reference project the judge compares against
    pub partner: Option<ProjectId>,
    pub group: GroupId,
    /// Group the judge left to get here
    pub switched_from: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupAllocator {
    quota: i64,
    single_holder: bool,
}

impl GroupAllocator {
    pub fn new(quota: i64, single_holder: bool) -> Self {
        Self {
            quota,
            single_holder,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.group_quota, config.single_holder)
    }

    /// Choose the judge's next project and record it as seen
    ///
    /// Mutates only the judge's `seen_projects`, `visited_groups` and
    /// `current_group_count`; the caller commits the judge.
    pub fn next_project_for(
        &self,
        judge: &mut Judge,
        projects: &[Project],
        now: DateTime<Utc>,
    ) -> EngineResult<Allocation> {
        let open: Vec<&Project> = projects
            .iter()
            .filter(|p| self.is_eligible(judge, p, now))
            .collect();

        if open.is_empty() {
            let unseen = projects
                .iter()
                .any(|p| p.active && !judge.has_seen(&p.id));
            return Err(if unseen {
                EngineError::ProjectsBusy { judge_id: judge.id }
            } else {
                EngineError::NoEligibleProject { judge_id: judge.id }
            });
        }

        let current = judge
            .last_seen()
            .and_then(|seen| projects.iter().find(|p| p.id == seen.project_id))
            .map(|p| p.group);

        let (group, switched_from) = match current {
            Some(group)
                if judge.current_group_count < self.quota
                    && open.iter().any(|p| p.group == group) =>
            {
                (group, None)
            }
            _ => {
                let chosen = choose_group(judge, projects, &open, current);
                if Some(chosen) == current {
                    (chosen, None)
                } else {
                    (chosen, current)
                }
            }
        };

        let mut candidates: Vec<&Project> = open.into_iter().filter(|p| p.group == group).collect();
        candidates.sort_by(|a, b| {
            b.prioritized
                .cmp(&a.prioritized)
                .then(a.votes.cmp(&b.votes))
                .then(a.id.cmp(&b.id))
        });
        let Some(candidate) = candidates.first().copied() else {
            return Err(EngineError::NoEligibleProject { judge_id: judge.id });
        };

        let partner = projects
            .iter()
            .filter(|p| {
                p.active && p.group == group && p.id != candidate.id && judge.has_seen(&p.id)
            })
            .min_by(|a, b| {
                (a.mu - candidate.mu)
                    .abs()
                    .total_cmp(&(b.mu - candidate.mu).abs())
                    .then(a.id.cmp(&b.id))
            })
            .or_else(|| candidates.get(1).copied())
            .map(|p| p.id);

        if current.is_none() || switched_from.is_some() {
            if let Some(left) = switched_from {
                judge.visit_group(left);
            }
            judge.current_group_count = 0;
        } else {
            judge.current_group_count += 1;
        }

        judge.record_seen(candidate.summary());

        let exhausted = projects
            .iter()
            .filter(|p| p.active && p.group == group)
            .all(|p| judge.has_seen(&p.id));
        if exhausted {
            judge.visit_group(group);
            judge.current_group_count = 0;
        }

        Ok(Allocation {
            project: candidate.id,
            partner,
            group,
            switched_from,
        })
    }

    fn is_eligible(&self, judge: &Judge, project: &Project, now: DateTime<Utc>) -> bool {
        project.active
            && !judge.has_seen(&project.id)
            && !(self.single_holder && project.is_leased_to_other(&judge.id, now))
    }
}

/// Unvisited first, then least handed out, then lowest id; the current group last
fn choose_group(
    judge: &Judge,
    projects: &[Project],
    open: &[&Project],
    current: Option<GroupId>,
) -> GroupId {
    let mut groups: Vec<GroupId> = open.iter().map(|p| p.group).collect();
    groups.sort();
    groups.dedup();

    let handed_out = |group: GroupId| -> i64 {
        projects
            .iter()
            .filter(|p| p.active && p.group == group)
            .map(|p| p.seen)
            .sum()
    };

    groups
        .into_iter()
        .min_by_key(|g| (Some(*g) == current, judge.has_visited(g), handed_out(*g), *g))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::{JudgeId, NewJudge, NewProject, ProjectLease, ReliabilityPrior, ScorePrior};
    use std::collections::HashSet;

    fn judge() -> Judge {
        Judge::new(
            NewJudge {
                name: "Lin".to_string(),
                email: "lin@example.com".to_string(),
                notes: String::new(),
            },
            &ReliabilityPrior::default(),
        )
    }

    fn project(location: i64, group: i64) -> Project {
        Project::new(
            NewProject {
                name: format!("table-{location}"),
                ..Default::default()
            },
            location,
            GroupId(group),
            &ScorePrior::default(),
            Utc::now(),
        )
    }

    fn two_groups(per_group: i64) -> Vec<Project> {
        (0..per_group * 2)
            .map(|i| project(i + 1, i / per_group))
            .collect()
    }

    #[test]
    fn test_never_returns_a_seen_project() {
        let allocator = GroupAllocator::new(2, true);
        let projects = two_groups(4);
        let mut judge = judge();
        let now = Utc::now();

        let mut served = HashSet::new();
        loop {
            match allocator.next_project_for(&mut judge, &projects, now) {
                Ok(allocation) => assert!(served.insert(allocation.project)),
                Err(EngineError::NoEligibleProject { .. }) => break,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(served.len(), projects.len());
        assert_eq!(judge.seen_projects.len(), projects.len());
    }

    #[test]
    fn test_quota_moves_judge_to_next_group() {
        let allocator = GroupAllocator::new(2, true);
        let projects = two_groups(4);
        let mut judge = judge();
        let now = Utc::now();

        let first = allocator.next_project_for(&mut judge, &projects, now).unwrap();
        assert_eq!(first.group, GroupId(0));
        assert_eq!(judge.current_group_count, 0);

        allocator.next_project_for(&mut judge, &projects, now).unwrap();
        allocator.next_project_for(&mut judge, &projects, now).unwrap();
        assert_eq!(judge.current_group_count, 2);

        let switched = allocator.next_project_for(&mut judge, &projects, now).unwrap();
        assert_eq!(switched.group, GroupId(1));
        assert_eq!(switched.switched_from, Some(GroupId(0)));
        assert_eq!(judge.current_group_count, 0);
        assert!(judge.has_visited(&GroupId(0)));
    }

    #[test]
    fn test_fresh_group_prefers_least_handed_out() {
        let allocator = GroupAllocator::new(3, true);
        let mut projects = two_groups(2);
        projects[0].seen = 5;
        let mut judge = judge();

        let allocation = allocator.next_project_for(&mut judge, &projects, Utc::now()).unwrap();
        assert_eq!(allocation.group, GroupId(1));
        assert_eq!(allocation.switched_from, None);
    }

    #[test]
    fn test_prioritized_then_fewest_votes() {
        let allocator = GroupAllocator::new(3, true);
        let mut projects: Vec<Project> = (1..=3).map(|l| project(l, 0)).collect();
        projects[0].votes = 4;
        projects[1].votes = 1;
        projects[2].votes = 9;
        projects[2].prioritized = true;
        let mut judge = judge();
        let now = Utc::now();

        let first = allocator.next_project_for(&mut judge, &projects, now).unwrap();
        assert_eq!(first.project, projects[2].id);
        let second = allocator.next_project_for(&mut judge, &projects, now).unwrap();
        assert_eq!(second.project, projects[1].id);
    }

    #[test]
    fn test_partner_has_closest_score() {
        let allocator = GroupAllocator::new(10, true);
        let mut projects: Vec<Project> = (1..=4).map(|l| project(l, 0)).collect();
        projects[0].mu = 2.0;
        projects[1].mu = 0.2;
        projects[3].votes = 5;
        let mut judge = judge();
        judge.record_seen(projects[0].summary());
        judge.record_seen(projects[1].summary());

        let allocation = allocator.next_project_for(&mut judge, &projects, Utc::now()).unwrap();
        assert_eq!(allocation.project, projects[2].id);
        assert_eq!(allocation.partner, Some(projects[1].id));
    }

    #[test]
    fn test_first_assignment_partners_with_next_candidate() {
        let allocator = GroupAllocator::new(3, true);
        let projects: Vec<Project> = (1..=2).map(|l| project(l, 0)).collect();
        let mut judge = judge();

        let allocation = allocator.next_project_for(&mut judge, &projects, Utc::now()).unwrap();
        assert!(allocation.partner.is_some());
        assert_ne!(allocation.partner, Some(allocation.project));
    }

    #[test]
    fn test_leased_projects_are_busy() {
        let allocator = GroupAllocator::new(3, true);
        let now = Utc::now();
        let mut projects: Vec<Project> = (1..=2).map(|l| project(l, 0)).collect();
        for p in &mut projects {
            p.lease = Some(ProjectLease {
                holder: JudgeId::new(),
                expires_at: now + Duration::minutes(5),
            });
        }
        let mut judge = judge();

        let err = allocator.next_project_for(&mut judge, &projects, now).unwrap_err();
        assert!(matches!(err, EngineError::ProjectsBusy { .. }));

        let later = now + Duration::minutes(6);
        assert!(allocator.next_project_for(&mut judge, &projects, later).is_ok());

        let shared_mode = GroupAllocator::new(3, false);
        let mut other = self::judge();
        assert!(shared_mode.next_project_for(&mut other, &projects, now).is_ok());
    }

    #[test]
    fn test_inactive_projects_are_skipped() {
        let allocator = GroupAllocator::new(3, true);
        let mut projects: Vec<Project> = (1..=2).map(|l| project(l, 0)).collect();
        projects[0].active = false;
        let mut judge = judge();

        let allocation = allocator.next_project_for(&mut judge, &projects, Utc::now()).unwrap();
        assert_eq!(allocation.project, projects[1].id);
        assert!(judge.has_visited(&GroupId(0)));

        let err = allocator.next_project_for(&mut judge, &projects, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::NoEligibleProject { .. }));
    }
}
