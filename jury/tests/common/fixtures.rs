//! Test fixtures and data for jury tests

use std::time::Duration;

use jury::RetryPolicy;
use shared::{NewJudge, NewProject};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const JUDGE_NAMES: [&'static str; 6] = ["ada", "bo", "cy", "di", "ed", "fay"];

    /// Judge sheet with a header row
    pub const JUDGES_CSV: &'static str = include_str!("../fixtures/judges.csv");

    /// Devpost export with three submissions and one incomplete row
    pub const DEVPOST_CSV: &'static str = include_str!("../fixtures/devpost.csv");

    /// Retry budget generous enough for heavily contended tests
    pub fn patient_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 500,
            base_delay: Duration::from_micros(100),
            max_delay: Duration::from_millis(5),
        }
    }

    pub fn judge(index: usize) -> NewJudge {
        let name = Self::JUDGE_NAMES
            .get(index)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("judge-{index}"));
        NewJudge {
            email: format!("{name}@example.com"),
            name,
            notes: String::new(),
        }
    }

    pub fn project(index: usize) -> NewProject {
        NewProject {
            name: format!("Project {index}"),
            description: format!("Hack number {index}"),
            try_link: Some(format!("https://example.com/try/{index}")),
            video_link: None,
            challenge_list: vec!["Best overall".to_string()],
        }
    }
}
