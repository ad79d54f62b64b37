//! Judging coordinator
//!
//! Wires the rotation, the group allocator, the comparison model and the
//! ranking aggregator to the injected stores and clock, and exposes the
//! operations judges and admins perform. The coordinator holds no state of
//! its own; every operation reads from and writes back to the stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    judge_debug, judge_info, Assignment, AssignmentOutcome, ComparisonContext, Flag, FlagReason,
    Judge, JudgeId, JudgingStats, NewJudge, NewProject, Project, ProjectId, ProjectLease,
    ProjectSummary, RankedProject, SharedError, VoteReceipt,
};

use crate::config::EngineConfig;
use crate::core::{
    retry_on_conflict, ComparisonEngine, GroupAllocator, QueueManager, RankingAggregator,
};
use crate::error::{EngineError, EngineResult};
use crate::traits::{Clock, JudgeStore, ProjectStore};

/// Coordinates judges, projects and votes over shared stores
pub struct JudgingService<J, P, C>
where
    J: JudgeStore + 'static,
    P: ProjectStore + 'static,
    C: Clock + 'static,
{
    judges: Arc<J>,
    projects: Arc<P>,
    clock: Arc<C>,
    config: EngineConfig,

    queue: QueueManager<J>,
    allocator: GroupAllocator,
    comparison: ComparisonEngine<J, P>,
    ranking: RankingAggregator,
}

impl<J, P, C> JudgingService<J, P, C>
where
    J: JudgeStore + 'static,
    P: ProjectStore + 'static,
    C: Clock + 'static,
{
    pub fn new(judges: Arc<J>, projects: Arc<P>, clock: Arc<C>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let queue = QueueManager::new(judges.clone(), config.retry.clone());
        let allocator = GroupAllocator::from_config(&config);
        let comparison = ComparisonEngine::new(
            judges.clone(),
            projects.clone(),
            config.scoring.clone(),
            config.retry.clone(),
        )?;

        Ok(Self {
            judges,
            projects,
            clock,
            config,
            queue,
            allocator,
            comparison,
            ranking: RankingAggregator::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a judge with the configured priors and put it in the rotation
    pub async fn add_judge(&self, profile: NewJudge) -> EngineResult<Judge> {
        let mut judge = Judge::new(profile, &self.config.scoring.reliability_prior);
        judge.touch(self.clock.now());
        let judge_id = judge.id;

        self.judges.insert_judge(judge).await?;
        self.queue.enqueue(judge_id).await?;
        judge_info!(judge_id, "add_judge", "judge registered");

        Ok(self.judges.get_judge(&judge_id).await?.value)
    }

    /// Register a project at the next free table
    pub async fn add_project(&self, details: NewProject) -> EngineResult<Project> {
        let location = self.projects.next_table_number().await?;
        let group = self.config.group_layout.group_for(location);
        let project = Project::new(
            details,
            location,
            group,
            &self.config.scoring.score_prior,
            self.clock.now(),
        );

        self.projects.insert_project(project.clone()).await?;
        tracing::info!(project = %project.id, location, group = %group, "project registered");
        Ok(project)
    }

    pub async fn judge(&self, judge_id: &JudgeId) -> EngineResult<Judge> {
        Ok(self.judges.get_judge(judge_id).await?.value)
    }

    pub async fn project(&self, project_id: &ProjectId) -> EngineResult<Project> {
        Ok(self.projects.get_project(project_id).await?.value)
    }

    /// Work for one judge
    ///
    /// An open comparison with a partner is handed back unchanged. Otherwise a
    /// new project is allocated, leased, counted as seen and recorded on the
    /// judge. The judge moves to the tail of the rotation either way.
    pub async fn request_assignment(&self, judge_id: JudgeId) -> EngineResult<AssignmentOutcome> {
        let (outcome, unpaired) =
            retry_on_conflict(&self.config.retry, "request_assignment", || {
                self.try_assign(judge_id)
            })
            .await?;

        if let Some(project_id) = unpaired {
            self.release_lease(judge_id, project_id).await?;
        }
        match &outcome {
            AssignmentOutcome::Assigned(assignment) => {
                judge_debug!(
                    judge_id,
                    "assign",
                    project = %assignment.project.id,
                    group = %assignment.group,
                    "assignment ready"
                );
            }
            other => {
                judge_info!(judge_id, "assign", outcome = ?other, "nothing to assign");
            }
        }

        self.rotate_if_queued(judge_id).await?;
        Ok(outcome)
    }

    /// Serve whichever judge is at the head of the rotation
    pub async fn serve_next(&self) -> EngineResult<AssignmentOutcome> {
        match self.queue.next_eligible_judge().await {
            Ok(judge_id) => self.request_assignment(judge_id).await,
            Err(EngineError::EmptyQueue) => Ok(AssignmentOutcome::NoActiveJudges),
            Err(err) => Err(err),
        }
    }

    /// Record a vote on the judge's open comparison
    pub async fn submit_vote(
        &self,
        judge_id: JudgeId,
        winner: ProjectId,
        loser: ProjectId,
    ) -> EngineResult<VoteReceipt> {
        let receipt = self
            .comparison
            .record_vote(judge_id, winner, loser, self.clock.now())
            .await?;

        self.release_lease(judge_id, winner).await?;
        self.release_lease(judge_id, loser).await?;
        self.rotate_if_queued(judge_id).await?;
        Ok(receipt)
    }

    /// Drop the open comparison, flagging the current project unless the table was just busy
    pub async fn skip_project(&self, judge_id: JudgeId, reason: FlagReason) -> EngineResult<Option<Flag>> {
        let context = retry_on_conflict(&self.config.retry, "skip_project", || {
            self.try_clear_comparison(judge_id)
        })
        .await?;

        let flag = if reason.is_recorded() {
            let flag = Flag::new(judge_id, context.current, reason, self.clock.now());
            self.projects.record_flag(flag.clone()).await?;
            Some(flag)
        } else {
            None
        };

        self.release_lease(judge_id, context.current).await?;
        self.rotate_if_queued(judge_id).await?;
        judge_info!(judge_id, "skip", project = %context.current, reason = %reason, "project skipped");
        Ok(flag)
    }

    /// Star or unstar a project the judge has seen
    pub async fn star_project(&self, judge_id: JudgeId, project_id: ProjectId, starred: bool) -> EngineResult<()> {
        let change = retry_on_conflict(&self.config.retry, "star_project", || {
            self.try_star_seen(judge_id, project_id, starred)
        })
        .await?;
        if change == 0 {
            return Ok(());
        }

        retry_on_conflict(&self.config.retry, "star_count", || {
            self.try_adjust_stars(project_id, change)
        })
        .await?;
        judge_debug!(judge_id, "star", project = %project_id, starred, "star updated");
        Ok(())
    }

    /// Take judges idle beyond the timeout out of the rotation
    ///
    /// Their seen lists and open comparisons are kept so `resume_judge` can
    /// pick up where they left off.
    pub async fn evict_idle(&self) -> EngineResult<Vec<JudgeId>> {
        let now = self.clock.now();
        let idle: Vec<JudgeId> = self
            .judges
            .list_judges()
            .await?
            .into_iter()
            .filter(|j| j.value.active && j.value.is_idle(now, self.config.idle_timeout))
            .map(|j| j.value.id)
            .collect();

        let mut evicted = Vec::with_capacity(idle.len());
        for judge_id in idle {
            match self.queue.remove(judge_id).await {
                Ok(()) => {}
                Err(EngineError::NotQueued { .. }) => continue,
                Err(err) => return Err(err),
            }
            self.release_all_leases(judge_id).await?;
            judge_info!(judge_id, "evict", "idle judge evicted");
            evicted.push(judge_id);
        }
        Ok(evicted)
    }

    /// Put an evicted or deactivated judge back in the rotation
    pub async fn resume_judge(&self, judge_id: JudgeId) -> EngineResult<()> {
        retry_on_conflict(&self.config.retry, "resume_judge", || self.try_touch(judge_id)).await?;
        self.queue.enqueue(judge_id).await?;
        judge_info!(judge_id, "resume", "judge resumed");
        Ok(())
    }

    pub async fn deactivate_judge(&self, judge_id: JudgeId) -> EngineResult<()> {
        self.queue.remove(judge_id).await?;
        self.release_all_leases(judge_id).await?;
        judge_info!(judge_id, "deactivate", "judge deactivated");
        Ok(())
    }

    /// Inactive projects are never assigned and lose any lease
    pub async fn set_project_active(&self, project_id: ProjectId, active: bool) -> EngineResult<()> {
        retry_on_conflict(&self.config.retry, "set_project_active", || {
            self.try_update_project(project_id, move |p| {
                p.active = active;
                if !active {
                    p.lease = None;
                }
            })
        })
        .await?;
        tracing::info!(project = %project_id, active, "project activity changed");
        Ok(())
    }

    pub async fn set_project_prioritized(&self, project_id: ProjectId, prioritized: bool) -> EngineResult<()> {
        retry_on_conflict(&self.config.retry, "set_project_prioritized", || {
            self.try_update_project(project_id, move |p| p.prioritized = prioritized)
        })
        .await?;
        tracing::info!(project = %project_id, prioritized, "project priority changed");
        Ok(())
    }

    pub async fn leaderboard(&self) -> EngineResult<Vec<RankedProject>> {
        let projects = self.all_projects().await?;
        Ok(self.ranking.leaderboard(&projects))
    }

    pub async fn stats(&self) -> EngineResult<JudgingStats> {
        let projects = self.all_projects().await?;
        let judges: Vec<Judge> = self
            .judges
            .list_judges()
            .await?
            .into_iter()
            .map(|j| j.value)
            .collect();
        Ok(self.ranking.stats(&projects, &judges))
    }

    pub async fn flags(&self) -> EngineResult<Vec<Flag>> {
        self.projects.list_flags().await
    }

    /// Judges in rotation order, checked for structural consistency
    pub async fn verify_queue(&self) -> EngineResult<Vec<JudgeId>> {
        self.queue.traverse().await
    }

    /// One assignment attempt; returns the outcome and an unpaired project to release
    async fn try_assign(&self, judge_id: JudgeId) -> EngineResult<(AssignmentOutcome, Option<ProjectId>)> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        if !judge.active {
            return Err(EngineError::JudgeInactive { judge_id });
        }
        let now = self.clock.now();

        let unpaired = match judge.comparison.take() {
            Some(context) if context.partner.is_some() => {
                let assignment = self.describe(judge_id, &context).await?;
                return Ok((AssignmentOutcome::Assigned(assignment), None));
            }
            Some(context) => Some(context.current),
            None => None,
        };

        let projects = self.all_projects().await?;
        let allocation = match self.allocator.next_project_for(&mut judge, &projects, now) {
            Ok(allocation) => allocation,
            Err(err) if err.is_exhaustion() => {
                if unpaired.is_some() {
                    // Only the stale comparison is dropped
                    judge.touch(now);
                    self.judges.save_judge(judge, stored.version).await?;
                }
                let outcome = match err {
                    EngineError::ProjectsBusy { .. } => AssignmentOutcome::ProjectsBusy { judge_id },
                    _ => AssignmentOutcome::JudgingComplete { judge_id },
                };
                return Ok((outcome, unpaired));
            }
            Err(err) => return Err(err),
        };

        let project = self.acquire(judge_id, allocation.project, now).await?;

        judge.comparison = Some(ComparisonContext {
            current: allocation.project,
            partner: allocation.partner,
            assigned_at: now,
        });
        judge.touch(now);
        if let Err(err) = self.judges.save_judge(judge, stored.version).await {
            self.undo_acquire(judge_id, allocation.project).await?;
            return Err(err);
        }

        if let Some(left) = allocation.switched_from {
            judge_info!(judge_id, "assign", from = %left, to = %allocation.group, "switched group");
        }

        let partner = match allocation.partner {
            Some(partner_id) => Some(ProjectSummary::from(
                &self.projects.get_project(&partner_id).await?.value,
            )),
            None => None,
        };
        Ok((
            AssignmentOutcome::Assigned(Assignment {
                judge_id,
                project: ProjectSummary::from(&project),
                partner,
                group: allocation.group,
            }),
            unpaired,
        ))
    }

    /// Lease the project to the judge and count the hand-out
    async fn acquire(&self, judge_id: JudgeId, project_id: ProjectId, now: DateTime<Utc>) -> EngineResult<Project> {
        let stored = self.projects.get_project(&project_id).await?;
        let mut project = stored.value;
        // Taken or withdrawn since the allocator looked; allocate again
        if !project.active || (self.config.single_holder && project.is_leased_to_other(&judge_id, now)) {
            return Err(EngineError::project_conflict(&project_id));
        }

        project.seen += 1;
        project.last_activity = now;
        if self.config.single_holder {
            let expires_at = now
                .checked_add_signed(self.config.lease_ttl)
                .ok_or_else(|| SharedError::invalid_config("lease_ttl", self.config.lease_ttl))?;
            project.lease = Some(ProjectLease {
                holder: judge_id,
                expires_at,
            });
        }
        self.projects.save_project(project.clone(), stored.version).await?;
        Ok(project)
    }

    async fn undo_acquire(&self, judge_id: JudgeId, project_id: ProjectId) -> EngineResult<()> {
        retry_on_conflict(&self.config.retry, "undo_acquire", || {
            self.try_update_project(project_id, move |p| {
                p.seen = (p.seen - 1).max(0);
                if p.is_held_by(&judge_id) {
                    p.lease = None;
                }
            })
        })
        .await
    }

    async fn release_lease(&self, judge_id: JudgeId, project_id: ProjectId) -> EngineResult<()> {
        retry_on_conflict(&self.config.retry, "release_lease", || {
            self.try_release(judge_id, project_id)
        })
        .await
    }

    async fn try_release(&self, judge_id: JudgeId, project_id: ProjectId) -> EngineResult<()> {
        let stored = self.projects.get_project(&project_id).await?;
        if !stored.value.is_held_by(&judge_id) {
            return Ok(());
        }
        let mut project = stored.value;
        project.lease = None;
        self.projects.save_project(project, stored.version).await?;
        Ok(())
    }

    async fn release_all_leases(&self, judge_id: JudgeId) -> EngineResult<()> {
        let held: Vec<ProjectId> = self
            .all_projects()
            .await?
            .into_iter()
            .filter(|p| p.is_held_by(&judge_id))
            .map(|p| p.id)
            .collect();
        for project_id in held {
            self.release_lease(judge_id, project_id).await?;
        }
        Ok(())
    }

    async fn rotate_if_queued(&self, judge_id: JudgeId) -> EngineResult<()> {
        match self.queue.rotate(judge_id).await {
            Err(EngineError::NotQueued { .. }) => Ok(()),
            other => other,
        }
    }

    async fn try_clear_comparison(&self, judge_id: JudgeId) -> EngineResult<ComparisonContext> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        let context = judge
            .comparison
            .take()
            .ok_or(EngineError::NoActiveComparison { judge_id })?;
        judge.touch(self.clock.now());
        self.judges.save_judge(judge, stored.version).await?;
        Ok(context)
    }

    /// Returns the change to the project's star counter
    async fn try_star_seen(&self, judge_id: JudgeId, project_id: ProjectId, starred: bool) -> EngineResult<i64> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        let wanted = i64::from(starred);
        let entry = judge
            .seen_projects
            .iter_mut()
            .find(|p| p.project_id == project_id)
            .ok_or(EngineError::ProjectNotFound { project_id })?;

        let change = wanted - entry.stars;
        if change == 0 {
            return Ok(0);
        }
        entry.stars = wanted;
        judge.touch(self.clock.now());
        self.judges.save_judge(judge, stored.version).await?;
        Ok(change)
    }

    async fn try_adjust_stars(&self, project_id: ProjectId, change: i64) -> EngineResult<()> {
        self.try_update_project(project_id, move |p| p.stars = (p.stars + change).max(0))
            .await
    }

    async fn try_touch(&self, judge_id: JudgeId) -> EngineResult<()> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        judge.touch(self.clock.now());
        self.judges.save_judge(judge, stored.version).await?;
        Ok(())
    }

    async fn try_update_project(&self, project_id: ProjectId, change: impl FnOnce(&mut Project)) -> EngineResult<()> {
        let stored = self.projects.get_project(&project_id).await?;
        let mut project = stored.value;
        change(&mut project);
        self.projects.save_project(project, stored.version).await?;
        Ok(())
    }

    async fn describe(&self, judge_id: JudgeId, context: &ComparisonContext) -> EngineResult<Assignment> {
        let project = self.projects.get_project(&context.current).await?.value;
        let partner = match context.partner {
            Some(partner_id) => Some(ProjectSummary::from(
                &self.projects.get_project(&partner_id).await?.value,
            )),
            None => None,
        };
        Ok(Assignment {
            judge_id,
            project: ProjectSummary::from(&project),
            partner,
            group: project.group,
        })
    }

    async fn all_projects(&self) -> EngineResult<Vec<Project>> {
        Ok(self
            .projects
            .list_projects()
            .await?
            .into_iter()
            .map(|p| p.value)
            .collect())
    }
}
