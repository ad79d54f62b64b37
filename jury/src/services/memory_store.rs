//! In-memory versioned store
//!
//! Reference implementation of `JudgeStore` and `ProjectStore`. Every record
//! carries a version that increments on each write; writes naming a stale
//! version are rejected with `VersionConflict`. Batches are checked in full
//! before anything is applied.

use std::collections::HashMap;

use tokio::sync::RwLock;

use shared::{Flag, Judge, JudgeId, Project, ProjectId};

use crate::error::{EngineError, EngineResult};
use crate::traits::{HeadUpdate, JudgeStore, LinkBatch, LinkSnapshot, ProjectStore, Versioned};

#[derive(Debug)]
struct StoreState {
    judges: HashMap<JudgeId, Versioned<Judge>>,
    head: Versioned<Option<JudgeId>>,
    projects: HashMap<ProjectId, Versioned<Project>>,
    flags: Vec<Flag>,
    last_table: i64,
}

/// Judge and project storage held in process memory
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                judges: HashMap::new(),
                head: Versioned::new(None, 0),
                projects: HashMap::new(),
                flags: Vec::new(),
                last_table: 0,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl JudgeStore for InMemoryStore {
    async fn get_judge(&self, id: &JudgeId) -> EngineResult<Versioned<Judge>> {
        let state = self.state.read().await;
        state
            .judges
            .get(id)
            .cloned()
            .ok_or(EngineError::JudgeNotFound { judge_id: *id })
    }

    async fn list_judges(&self) -> EngineResult<Vec<Versioned<Judge>>> {
        let state = self.state.read().await;
        let mut judges: Vec<_> = state.judges.values().cloned().collect();
        judges.sort_by(|a, b| a.value.id.cmp(&b.value.id));
        Ok(judges)
    }

    async fn insert_judge(&self, judge: Judge) -> EngineResult<()> {
        let mut state = self.state.write().await;
        if state.judges.contains_key(&judge.id) {
            return Err(EngineError::judge_conflict(&judge.id));
        }
        state.judges.insert(judge.id, Versioned::new(judge, 1));
        Ok(())
    }

    async fn save_judge(&self, judge: Judge, expected_version: u64) -> EngineResult<u64> {
        let mut state = self.state.write().await;
        let current = state
            .judges
            .get_mut(&judge.id)
            .ok_or(EngineError::JudgeNotFound { judge_id: judge.id })?;
        if current.version != expected_version {
            return Err(EngineError::judge_conflict(&judge.id));
        }
        current.version += 1;
        current.value = judge;
        Ok(current.version)
    }

    async fn link_snapshot(&self, ids: &[JudgeId]) -> EngineResult<LinkSnapshot> {
        let state = self.state.read().await;
        Ok(LinkSnapshot {
            head: state.head.clone(),
            judges: ids
                .iter()
                .filter_map(|id| state.judges.get(id).cloned())
                .collect(),
        })
    }

    async fn commit_links(&self, batch: LinkBatch) -> EngineResult<()> {
        let mut state = self.state.write().await;
        if state.head.version != batch.head_version {
            return Err(EngineError::queue_conflict());
        }
        for write in &batch.judges {
            match state.judges.get(&write.value.id) {
                Some(current) if current.version == write.version => {}
                Some(_) => return Err(EngineError::judge_conflict(&write.value.id)),
                None => {
                    return Err(EngineError::JudgeNotFound {
                        judge_id: write.value.id,
                    })
                }
            }
        }

        if let HeadUpdate::Set(head) = batch.head {
            state.head.value = head;
            state.head.version += 1;
        }
        for write in batch.judges {
            if let Some(current) = state.judges.get_mut(&write.value.id) {
                current.version += 1;
                current.value = write.value;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProjectStore for InMemoryStore {
    async fn get_project(&self, id: &ProjectId) -> EngineResult<Versioned<Project>> {
        let state = self.state.read().await;
        state
            .projects
            .get(id)
            .cloned()
            .ok_or(EngineError::ProjectNotFound { project_id: *id })
    }

    async fn list_projects(&self) -> EngineResult<Vec<Versioned<Project>>> {
        let state = self.state.read().await;
        let mut projects: Vec<_> = state.projects.values().cloned().collect();
        projects.sort_by(|a, b| {
            a.value
                .location
                .cmp(&b.value.location)
                .then_with(|| a.value.id.cmp(&b.value.id))
        });
        Ok(projects)
    }

    async fn insert_project(&self, project: Project) -> EngineResult<()> {
        let mut state = self.state.write().await;
        if state.projects.contains_key(&project.id) {
            return Err(EngineError::project_conflict(&project.id));
        }
        state.last_table = state.last_table.max(project.location);
        state.projects.insert(project.id, Versioned::new(project, 1));
        Ok(())
    }

    async fn save_project(&self, project: Project, expected_version: u64) -> EngineResult<u64> {
        let mut state = self.state.write().await;
        let current = state
            .projects
            .get_mut(&project.id)
            .ok_or(EngineError::ProjectNotFound {
                project_id: project.id,
            })?;
        if current.version != expected_version {
            return Err(EngineError::project_conflict(&project.id));
        }
        current.version += 1;
        current.value = project;
        Ok(current.version)
    }

    async fn save_projects(&self, projects: Vec<Versioned<Project>>) -> EngineResult<()> {
        let mut state = self.state.write().await;
        for write in &projects {
            match state.projects.get(&write.value.id) {
                Some(current) if current.version == write.version => {}
                Some(_) => return Err(EngineError::project_conflict(&write.value.id)),
                None => {
                    return Err(EngineError::ProjectNotFound {
                        project_id: write.value.id,
                    })
                }
            }
        }
        for write in projects {
            if let Some(current) = state.projects.get_mut(&write.value.id) {
                current.version += 1;
                current.value = write.value;
            }
        }
        Ok(())
    }

    async fn next_table_number(&self) -> EngineResult<i64> {
        let mut state = self.state.write().await;
        state.last_table += 1;
        Ok(state.last_table)
    }

    async fn record_flag(&self, flag: Flag) -> EngineResult<()> {
        let mut state = self.state.write().await;
        state.flags.push(flag);
        Ok(())
    }

    async fn list_flags(&self) -> EngineResult<Vec<Flag>> {
        let state = self.state.read().await;
        Ok(state.flags.clone())
    }
}
