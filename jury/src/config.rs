//! Engine configuration and startup settings
//!
//! ## Configuration Sources
//! Settings are read from:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables
//!
//! ## Required Keys
//! - `JURY_ADMIN_PASSWORD`: admin password, must be non-empty
//! - `EMAIL_FROM`: sender address for judge emails, must be non-empty
//!
//! ## Optional Keys
//! - `JURY_ALPHA_PRIOR`, `JURY_BETA_PRIOR`: judge reliability prior
//! - `JURY_GROUP_QUOTA`: assignments in a group before moving on
//! - `JURY_SINGLE_HOLDER`: one judge per project at a time (`true`/`false`)
//! - `JURY_LEASE_TTL_SECS`: how long a project lease lasts
//! - `JURY_IDLE_TIMEOUT_SECS`: inactivity before a judge leaves the rotation
//! - `JURY_RETRY_ATTEMPTS`: compare-and-swap attempts before giving up
//! - `JURY_GROUPS`: table ranges such as `1-10,11-20`

use std::str::FromStr;

use chrono::Duration;
use shared::{GroupLayout, ReliabilityPrior, ScorePrior, SharedError};

use crate::core::retry::RetryPolicy;
use crate::error::{EngineError, EngineResult};
use crate::traits::EnvSource;

/// Parameters of the pairwise comparison model
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub score_prior: ScorePrior,
    pub reliability_prior: ReliabilityPrior,
    /// Step size `k` of the mean update
    pub learning_rate: f64,
    /// How strongly a vote shrinks the variances
    pub variance_shrink: f64,
    /// Variances never drop below this
    pub variance_floor: f64,
    /// Largest reliability credit a single vote can earn
    pub reliability_credit: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            score_prior: ScorePrior::default(),
            reliability_prior: ReliabilityPrior::default(),
            learning_rate: 1.0,
            variance_shrink: 0.5,
            variance_floor: 1e-4,
            reliability_credit: 1.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> EngineResult<()> {
        self.score_prior.validate()?;
        self.reliability_prior.validate()?;
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SharedError::invalid_config("learning_rate", self.learning_rate).into());
        }
        if !(0.0..=1.0).contains(&self.variance_shrink) {
            return Err(SharedError::invalid_config("variance_shrink", self.variance_shrink).into());
        }
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(SharedError::invalid_config("variance_floor", self.variance_floor).into());
        }
        if !(self.reliability_credit.is_finite() && self.reliability_credit >= 0.0) {
            return Err(
                SharedError::invalid_config("reliability_credit", self.reliability_credit).into(),
            );
        }
        Ok(())
    }
}

/// Everything the judging core needs to run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    /// Follow-up assignments a judge receives in one group before switching
    pub group_quota: i64,
    /// Lease projects so only one judge visits a table at a time
    pub single_holder: bool,
    pub lease_ttl: Duration,
    pub idle_timeout: Duration,
    pub retry: RetryPolicy,
    pub group_layout: GroupLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            group_quota: 3,
            single_holder: true,
            lease_ttl: Duration::minutes(10),
            idle_timeout: Duration::minutes(20),
            retry: RetryPolicy::default(),
            group_layout: GroupLayout::default(),
        }
    }
}

impl EngineConfig {
    /// Longest lease or idle window accepted
    pub const MAX_WINDOW_DAYS: i64 = 365;

    pub fn validate(&self) -> EngineResult<()> {
        self.scoring.validate()?;
        if self.group_quota < 0 {
            return Err(SharedError::invalid_config("group_quota", self.group_quota).into());
        }
        if !is_sane_window(self.lease_ttl) {
            return Err(SharedError::invalid_config("lease_ttl", self.lease_ttl).into());
        }
        if !is_sane_window(self.idle_timeout) {
            return Err(SharedError::invalid_config("idle_timeout", self.idle_timeout).into());
        }
        if self.retry.max_attempts == 0 {
            return Err(SharedError::invalid_config("retry_attempts", 0).into());
        }
        Ok(())
    }
}

/// Process-level settings loaded at startup
#[derive(Debug, Clone)]
pub struct JurySettings {
    pub admin_password: String,
    pub email_from: String,
    pub engine: EngineConfig,
}

impl JurySettings {
    /// Read and validate settings; any missing required key is fatal
    pub fn load(env: &dyn EnvSource) -> EngineResult<Self> {
        let admin_password = required(env, "JURY_ADMIN_PASSWORD")?;
        let email_from = required(env, "EMAIL_FROM")?;

        let defaults = EngineConfig::default();
        let scoring = ScoringConfig {
            reliability_prior: ReliabilityPrior {
                alpha: optional(env, "JURY_ALPHA_PRIOR", defaults.scoring.reliability_prior.alpha)?,
                beta: optional(env, "JURY_BETA_PRIOR", defaults.scoring.reliability_prior.beta)?,
            },
            ..defaults.scoring.clone()
        };

        let group_layout = match env.var("JURY_GROUPS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => GroupLayout::parse(&raw)?,
            None => GroupLayout::default(),
        };

        let engine = EngineConfig {
            scoring,
            group_quota: optional(env, "JURY_GROUP_QUOTA", defaults.group_quota)?,
            single_holder: optional_flag(env, "JURY_SINGLE_HOLDER", defaults.single_holder)?,
            lease_ttl: optional_secs(env, "JURY_LEASE_TTL_SECS", defaults.lease_ttl)?,
            idle_timeout: optional_secs(env, "JURY_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            retry: RetryPolicy {
                max_attempts: optional(env, "JURY_RETRY_ATTEMPTS", defaults.retry.max_attempts)?,
                ..defaults.retry.clone()
            },
            group_layout,
        };
        engine.validate()?;

        Ok(Self {
            admin_password,
            email_from,
            engine,
        })
    }
}

/// Defined and not empty
fn required(env: &dyn EnvSource, key: &str) -> EngineResult<String> {
    match env.var(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(EngineError::MissingEnv {
            key: key.to_string(),
        }),
    }
}

fn optional<T: FromStr>(env: &dyn EnvSource, key: &str, default: T) -> EngineResult<T> {
    match env.var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| SharedError::invalid_config(key, &raw).into()),
        None => Ok(default),
    }
}

fn optional_secs(env: &dyn EnvSource, key: &str, default: Duration) -> EngineResult<Duration> {
    match env.var(key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(Duration::try_seconds)
            .filter(|window| is_sane_window(*window))
            .ok_or_else(|| SharedError::invalid_config(key, &raw).into()),
        None => Ok(default),
    }
}

/// Positive and no longer than `MAX_WINDOW_DAYS`
fn is_sane_window(window: Duration) -> bool {
    window > Duration::zero() && window <= Duration::days(EngineConfig::MAX_WINDOW_DAYS)
}

fn optional_flag(env: &dyn EnvSource, key: &str, default: bool) -> EngineResult<bool> {
    match env.var(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SharedError::invalid_config(key, &raw).into()),
        },
        None => Ok(default),
    }
}
