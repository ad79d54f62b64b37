//! Trait definitions with mockall annotations for testing
//!
//! The engine talks to storage, time and the process environment only through
//! these traits. Stores expose versioned records; every write names the
//! version it was computed from and fails with `VersionConflict` when the
//! record moved on in the meantime.

use chrono::{DateTime, Utc};
use shared::{Flag, Judge, JudgeId, Project, ProjectId};

use crate::error::EngineResult;

/// A record together with the store version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

/// Queue head and a set of judges, all read at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSnapshot {
    pub head: Versioned<Option<JudgeId>>,
    /// Requested judges that exist; missing ids are simply absent
    pub judges: Vec<Versioned<Judge>>,
}

/// What to do with the queue head in a link batch
#[derive(Debug, Clone, PartialEq)]
pub enum HeadUpdate {
    Keep,
    Set(Option<JudgeId>),
}

/// All-or-nothing write over the queue head and judge records
///
/// The head version is always checked, even with `HeadUpdate::Keep`. Each
/// judge carries the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkBatch {
    pub head_version: u64,
    pub head: HeadUpdate,
    pub judges: Vec<Versioned<Judge>>,
}

/// Durable storage of judges and of the rotation head pointer
#[mockall::automock]
#[async_trait::async_trait]
pub trait JudgeStore: Send + Sync {
    /// Fetch one judge, `JudgeNotFound` if absent
    async fn get_judge(&self, id: &JudgeId) -> EngineResult<Versioned<Judge>>;

    /// Consistent snapshot of every judge
    async fn list_judges(&self) -> EngineResult<Vec<Versioned<Judge>>>;

    /// Store a new judge at version 1
    async fn insert_judge(&self, judge: Judge) -> EngineResult<()>;

    /// Compare-and-swap a single judge, returning the new version
    async fn save_judge(&self, judge: Judge, expected_version: u64) -> EngineResult<u64>;

    /// Read the queue head and the given judges atomically
    async fn link_snapshot(&self, ids: &[JudgeId]) -> EngineResult<LinkSnapshot>;

    /// Apply a link batch atomically or fail with `VersionConflict`
    async fn commit_links(&self, batch: LinkBatch) -> EngineResult<()>;
}

/// Durable storage of projects and flags
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fetch one project, `ProjectNotFound` if absent
    async fn get_project(&self, id: &ProjectId) -> EngineResult<Versioned<Project>>;

    /// Consistent snapshot of every project
    async fn list_projects(&self) -> EngineResult<Vec<Versioned<Project>>>;

    /// Store a new project at version 1
    async fn insert_project(&self, project: Project) -> EngineResult<()>;

    /// Compare-and-swap a single project, returning the new version
    async fn save_project(&self, project: Project, expected_version: u64) -> EngineResult<u64>;

    /// Compare-and-swap several projects at once, all or nothing
    async fn save_projects(&self, projects: Vec<Versioned<Project>>) -> EngineResult<()>;

    /// Allocate the next table number, starting at 1
    async fn next_table_number(&self) -> EngineResult<i64>;

    async fn record_flag(&self, flag: Flag) -> EngineResult<()>;

    async fn list_flags(&self) -> EngineResult<Vec<Flag>>;
}

/// Time source for activity stamps, leases and idle eviction
#[mockall::automock]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Process environment lookup
#[mockall::automock]
pub trait EnvSource: Send + Sync {
    /// Value of `key`, or `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that mock traits can be instantiated
    #[test]
    fn test_mock_trait_instantiation() {
        let _judges = MockJudgeStore::new();
        let _projects = MockProjectStore::new();
        let mut clock = MockClock::new();
        let mut env = MockEnvSource::new();

        let epoch = DateTime::<Utc>::default();
        clock.expect_now().return_const(epoch);
        env.expect_var().returning(|_| None);

        assert_eq!(clock.now(), epoch);
        assert_eq!(env.var("EMAIL_FROM"), None);
    }
}
