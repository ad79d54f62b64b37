//! Pairwise comparison model
//!
//! Each project carries a Gaussian belief `(mu, sigma_sq)` over its quality.
//! A vote moves the two means apart in proportion to how surprising the
//! outcome was, shrinks both variances, and credits the judge's reliability
//! with how confidently the model agreed or disagreed with them.
//!
//! A vote commits in three steps:
//! 1. the judge record claims its comparison context (`votes += 1`);
//! 2. both projects are written in one all-or-nothing batch, recomputed from
//!    fresh reads on every retry;
//! 3. the reliability credit is applied in its own loop.
//!
//! If step 2 fails the claimed context is handed back to the judge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    judge_debug, judge_info, judge_warn, ComparisonContext, JudgeId, Project, ProjectId,
    ScoreChange, SharedError, UpdatedScores, VoteReceipt,
};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::ScoringConfig;
use crate::core::retry::{retry_on_conflict, RetryPolicy};
use crate::error::{EngineError, EngineResult};
use crate::traits::{JudgeStore, ProjectStore, Versioned};

const PROBABILITY_CLAMP: f64 = 1e-9;

/// Context taken from the judge in step 1
struct Claim {
    context: ComparisonContext,
    reliability: f64,
}

/// Updates project beliefs and judge reliability from votes
pub struct ComparisonEngine<J: JudgeStore, P: ProjectStore> {
    judges: Arc<J>,
    projects: Arc<P>,
    scoring: ScoringConfig,
    retry: RetryPolicy,
    standard_normal: Normal,
}

impl<J: JudgeStore, P: ProjectStore> ComparisonEngine<J, P> {
    pub fn new(
        judges: Arc<J>,
        projects: Arc<P>,
        scoring: ScoringConfig,
        retry: RetryPolicy,
    ) -> EngineResult<Self> {
        scoring.validate()?;
        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|e| SharedError::invalid_config("standard_normal", e))?;
        Ok(Self {
            judges,
            projects,
            scoring,
            retry,
            standard_normal,
        })
    }

    /// Model probability that `winner` beats `loser`
    pub fn win_probability(&self, winner: &Project, loser: &Project) -> f64 {
        let spread = (winner.sigma_sq + loser.sigma_sq).sqrt();
        let z = (winner.mu - loser.mu) / spread;
        self.standard_normal
            .cdf(z)
            .clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP)
    }

    /// Apply one vote to both projects in place; returns the predicted win probability
    pub fn apply(&self, winner: &mut Project, loser: &mut Project, reliability: f64) -> f64 {
        let p = self.win_probability(winner, loser);
        let step = reliability * self.scoring.learning_rate * (1.0 - p);

        winner.mu += step * winner.sigma_sq;
        loser.mu -= step * loser.sigma_sq;

        let shrink = 1.0 - self.scoring.variance_shrink * reliability * p * (1.0 - p);
        winner.sigma_sq = (winner.sigma_sq * shrink).max(self.scoring.variance_floor);
        loser.sigma_sq = (loser.sigma_sq * shrink).max(self.scoring.variance_floor);

        winner.votes += 1;
        loser.votes += 1;
        p
    }

    /// `(alpha, beta)` increments earned for a vote the model predicted with `p`
    pub fn reliability_delta(&self, p: f64) -> (f64, f64) {
        let delta = self.scoring.reliability_credit * 2.0 * (p - 0.5).abs();
        if p >= 0.5 {
            (delta, 0.0)
        } else {
            (0.0, delta)
        }
    }

    /// Record `winner` beating `loser` in the judge's open comparison
    pub async fn record_vote(
        &self,
        judge_id: JudgeId,
        winner: ProjectId,
        loser: ProjectId,
        now: DateTime<Utc>,
    ) -> EngineResult<VoteReceipt> {
        if winner == loser {
            return Err(EngineError::InvalidPair {
                judge_id,
                winner,
                loser,
                reason: "a project cannot be compared with itself",
            });
        }

        let claim = retry_on_conflict(&self.retry, "claim_comparison", || {
            self.try_claim(judge_id, winner, loser, now)
        })
        .await?;

        let scored = retry_on_conflict(&self.retry, "score_pair", || {
            self.try_score(winner, loser, claim.reliability, now)
        })
        .await;

        let (winner_change, loser_change, predicted) = match scored {
            Ok(scored) => scored,
            Err(err) => {
                judge_warn!(judge_id, "vote", error = %err, "scoring failed, restoring comparison");
                retry_on_conflict(&self.retry, "restore_comparison", || {
                    self.try_restore(judge_id, &claim.context)
                })
                .await?;
                return Err(err);
            }
        };

        let (alpha_delta, beta_delta) = self.reliability_delta(predicted);
        let (judge_votes, judge_alpha, judge_beta) =
            retry_on_conflict(&self.retry, "credit_reliability", || {
                self.try_credit(judge_id, alpha_delta, beta_delta)
            })
            .await?;

        judge_info!(
            judge_id,
            "vote",
            winner = %winner,
            loser = %loser,
            predicted,
            "vote recorded"
        );

        Ok(VoteReceipt {
            judge_id,
            judge_votes,
            scores: UpdatedScores {
                winner: winner_change,
                loser: loser_change,
                predicted,
                judge_alpha,
                judge_beta,
            },
        })
    }

    async fn try_claim(
        &self,
        judge_id: JudgeId,
        winner: ProjectId,
        loser: ProjectId,
        now: DateTime<Utc>,
    ) -> EngineResult<Claim> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        if !judge.active {
            return Err(EngineError::JudgeInactive { judge_id });
        }
        let context = judge
            .comparison
            .take()
            .ok_or(EngineError::NoActiveComparison { judge_id })?;
        if !context.matches_pair(&winner, &loser) {
            return Err(EngineError::InvalidPair {
                judge_id,
                winner,
                loser,
                reason: "pair does not match the open comparison",
            });
        }

        let reliability = judge.reliability();
        judge.votes += 1;
        judge.touch(now);
        self.judges.save_judge(judge, stored.version).await?;

        Ok(Claim {
            context,
            reliability,
        })
    }

    async fn try_score(
        &self,
        winner: ProjectId,
        loser: ProjectId,
        reliability: f64,
        now: DateTime<Utc>,
    ) -> EngineResult<(ScoreChange, ScoreChange, f64)> {
        let w = self.projects.get_project(&winner).await?;
        let l = self.projects.get_project(&loser).await?;

        let mut winner_next = w.value.clone();
        let mut loser_next = l.value.clone();
        let predicted = self.apply(&mut winner_next, &mut loser_next, reliability);
        winner_next.last_activity = now;
        loser_next.last_activity = now;

        let changes = (
            score_change(&w.value, &winner_next),
            score_change(&l.value, &loser_next),
            predicted,
        );

        self.projects
            .save_projects(vec![
                Versioned::new(winner_next, w.version),
                Versioned::new(loser_next, l.version),
            ])
            .await?;
        Ok(changes)
    }

    async fn try_restore(&self, judge_id: JudgeId, context: &ComparisonContext) -> EngineResult<()> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        if judge.comparison.is_none() {
            judge.comparison = Some(context.clone());
        }
        judge.votes = (judge.votes - 1).max(0);
        self.judges.save_judge(judge, stored.version).await?;
        judge_debug!(judge_id, "vote", "comparison restored");
        Ok(())
    }

    async fn try_credit(
        &self,
        judge_id: JudgeId,
        alpha_delta: f64,
        beta_delta: f64,
    ) -> EngineResult<(i64, f64, f64)> {
        let stored = self.judges.get_judge(&judge_id).await?;
        let mut judge = stored.value;
        judge.alpha += alpha_delta;
        judge.beta += beta_delta;
        let result = (judge.votes, judge.alpha, judge.beta);
        self.judges.save_judge(judge, stored.version).await?;
        Ok(result)
    }
}

fn score_change(before: &Project, after: &Project) -> ScoreChange {
    ScoreChange {
        project_id: before.id,
        mu_before: before.mu,
        mu_after: after.mu,
        sigma_sq_before: before.sigma_sq,
        sigma_sq_after: after.sigma_sq,
    }
}
