//! Test helpers and builder patterns for jury tests

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use jury::services::{InMemoryStore, ManualClock};
use jury::{EngineConfig, EngineResult, JudgingService, RetryPolicy};
use shared::{AssignmentOutcome, FlagReason, GroupLayout, JudgeId, ProjectId};

use super::fixtures::TestFixtures;

pub type Service = JudgingService<InMemoryStore, InMemoryStore, ManualClock>;

/// A service wired to an in-memory store and a manual clock
pub struct TestJury {
    pub service: Arc<Service>,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

/// Builder for test services with sensible defaults
pub struct JuryBuilder {
    config: EngineConfig,
}

impl JuryBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                retry: TestFixtures::patient_retry(),
                ..EngineConfig::default()
            },
        }
    }

    pub fn with_groups(mut self, layout: &str) -> Self {
        self.config.group_layout = GroupLayout::parse(layout).unwrap();
        self
    }

    pub fn with_quota(mut self, quota: i64) -> Self {
        self.config.group_quota = quota;
        self
    }

    pub fn with_single_holder(mut self, single_holder: bool) -> Self {
        self.config.single_holder = single_holder;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> TestJury {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = JudgingService::new(store.clone(), store.clone(), clock.clone(), self.config)
            .expect("valid test configuration");
        TestJury {
            service: Arc::new(service),
            store,
            clock,
        }
    }
}

/// Common helper functions for test setup and driving the service
pub struct TestHelpers;

impl TestHelpers {
    pub async fn seed_judges(service: &Service, count: usize) -> Vec<JudgeId> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            ids.push(service.add_judge(TestFixtures::judge(i)).await.unwrap().id);
        }
        ids
    }

    pub async fn seed_projects(service: &Service, count: usize) -> Vec<ProjectId> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            ids.push(service.add_project(TestFixtures::project(i + 1)).await.unwrap().id);
        }
        ids
    }

    /// Vote for whichever project ranks higher in `quality` (missing entries count as zero)
    pub async fn judge_once(
        service: &Service,
        judge_id: JudgeId,
        quality: &HashMap<ProjectId, f64>,
    ) -> EngineResult<AssignmentOutcome> {
        let outcome = service.request_assignment(judge_id).await?;
        if let AssignmentOutcome::Assigned(assignment) = &outcome {
            match &assignment.partner {
                Some(partner) => {
                    let score = |id: &ProjectId| quality.get(id).copied().unwrap_or_default();
                    let (winner, loser) = if score(&assignment.project.id) >= score(&partner.id) {
                        (assignment.project.id, partner.id)
                    } else {
                        (partner.id, assignment.project.id)
                    };
                    service.submit_vote(judge_id, winner, loser).await?;
                }
                None => {
                    service.skip_project(judge_id, FlagReason::Busy).await?;
                }
            }
        }
        Ok(outcome)
    }

    /// Keep judging until the judge has seen everything; returns assignments served
    pub async fn judge_until_complete(
        service: &Service,
        judge_id: JudgeId,
        quality: &HashMap<ProjectId, f64>,
    ) -> EngineResult<usize> {
        let mut served = 0;
        loop {
            match Self::judge_once(service, judge_id, quality).await? {
                AssignmentOutcome::Assigned(_) => served += 1,
                AssignmentOutcome::ProjectsBusy { .. } => tokio::task::yield_now().await,
                AssignmentOutcome::JudgingComplete { .. } | AssignmentOutcome::NoActiveJudges => {
                    return Ok(served)
                }
            }
        }
    }
}
