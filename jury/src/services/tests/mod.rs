//! Service-specific tests
//!
//! Each service has its own test file with dedicated fixtures and helpers.

#[cfg(test)]
mod env_config;

// Common test utilities for services
#[cfg(test)]
pub mod common {
    use chrono::Utc;
    use shared::{GroupId, Judge, NewJudge, NewProject, Project, ReliabilityPrior, ScorePrior};

    pub fn test_judge(name: &str) -> Judge {
        Judge::new(
            NewJudge {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                notes: String::new(),
            },
            &ReliabilityPrior::default(),
        )
    }

    pub fn test_project(location: i64) -> Project {
        Project::new(
            NewProject {
                name: format!("table-{location}"),
                ..Default::default()
            },
            location,
            GroupId(0),
            &ScorePrior::default(),
            Utc::now(),
        )
    }
}
