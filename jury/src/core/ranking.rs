//! Leaderboard ordering and summary statistics

use std::cmp::Ordering;

use shared::{Judge, JudgingStats, Project, ProjectId, RankedProject};

/// Reduces project beliefs to a total order
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingAggregator;

impl RankingAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Highest `mu` first; ties go to the smaller variance, then the lower id
    pub fn rank(&self, projects: &[Project]) -> Vec<ProjectId> {
        self.ordered(projects).into_iter().map(|p| p.id).collect()
    }

    pub fn leaderboard(&self, projects: &[Project]) -> Vec<RankedProject> {
        self.ordered(projects)
            .into_iter()
            .enumerate()
            .map(|(i, p)| RankedProject {
                rank: i + 1,
                id: p.id,
                name: p.name.clone(),
                location: p.location,
                group: p.group,
                mu: p.mu,
                sigma_sq: p.sigma_sq,
                votes: p.votes,
                seen: p.seen,
                stars: p.stars,
            })
            .collect()
    }

    pub fn stats(&self, projects: &[Project], judges: &[Judge]) -> JudgingStats {
        if projects.is_empty() {
            return JudgingStats {
                judges: judges.len() as u64,
                ..JudgingStats::default()
            };
        }

        let count = projects.len() as f64;
        JudgingStats {
            projects: projects.len() as u64,
            avg_seen: projects.iter().map(|p| p.seen as f64).sum::<f64>() / count,
            avg_votes: projects.iter().map(|p| p.votes as f64).sum::<f64>() / count,
            max_mu: projects
                .iter()
                .map(|p| p.mu)
                .fold(f64::NEG_INFINITY, f64::max),
            avg_sigma: projects.iter().map(Project::sigma).sum::<f64>() / count,
            judges: judges.len() as u64,
        }
    }

    fn ordered<'a>(&self, projects: &'a [Project]) -> Vec<&'a Project> {
        let mut ordered: Vec<&Project> = projects.iter().collect();
        ordered.sort_by(|a, b| compare(a, b));
        ordered
    }
}

fn compare(a: &Project, b: &Project) -> Ordering {
    b.mu
        .total_cmp(&a.mu)
        .then(a.sigma_sq.total_cmp(&b.sigma_sq))
        .then(a.id.cmp(&b.id))
}
