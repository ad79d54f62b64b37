//! Judge rotation
//!
//! Active judges form one circular doubly-linked list through their
//! `next`/`prev` fields, with a versioned head pointer in the store. The head
//! is the judge served next; the tail (`head.prev`) was served most recently.
//!
//! Every mutation loads a consistent snapshot of the head and of each record
//! it touches, checks the pointers, and commits one `LinkBatch`. Conflicts are
//! retried through `retry_on_conflict`; pointer disagreement inside a single
//! snapshot is reported as `QueueCorrupted` and left alone.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use shared::{judge_debug, judge_error, judge_info, Judge, JudgeId};

use crate::core::retry::{retry_on_conflict, RetryPolicy};
use crate::error::{EngineError, EngineResult};
use crate::traits::{HeadUpdate, JudgeStore, LinkBatch, Versioned};

/// Snapshot reloads allowed while the neighbourhood keeps shifting
const MAX_SNAPSHOT_ROUNDS: usize = 4;

/// Working copy of the records one queue mutation reads and writes
struct Links {
    head: Versioned<Option<JudgeId>>,
    read: HashMap<JudgeId, Versioned<Judge>>,
    staged: HashMap<JudgeId, Judge>,
    operation: &'static str,
}

impl Links {
    fn judge(&self, id: &JudgeId) -> EngineResult<&Judge> {
        if let Some(judge) = self.staged.get(id) {
            return Ok(judge);
        }
        self.read
            .get(id)
            .map(|v| &v.value)
            .ok_or_else(|| EngineError::corrupted(*id, self.operation, "linked judge is missing"))
    }

    fn edit(&mut self, id: JudgeId, change: impl FnOnce(&mut Judge)) -> EngineResult<()> {
        let current = self.judge(&id)?.clone();
        let judge = self.staged.entry(id).or_insert(current);
        change(judge);
        Ok(())
    }

    fn into_batch(self, head: HeadUpdate) -> LinkBatch {
        let read = self.read;
        let judges = self
            .staged
            .into_iter()
            .filter_map(|(id, judge)| {
                let original = read.get(&id)?;
                (original.value != judge).then(|| Versioned::new(judge, original.version))
            })
            .collect();
        LinkBatch {
            head_version: self.head.version,
            head,
            judges,
        }
    }
}

/// Maintains the round-robin order in which judges receive work
pub struct QueueManager<J: JudgeStore> {
    store: Arc<J>,
    retry: RetryPolicy,
}

impl<J: JudgeStore> QueueManager<J> {
    pub fn new(store: Arc<J>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Judge at the head of the rotation
    pub async fn next_eligible_judge(&self) -> EngineResult<JudgeId> {
        let snapshot = self.store.link_snapshot(&[]).await?;
        snapshot.head.value.ok_or(EngineError::EmptyQueue)
    }

    /// Activate a judge and link it in at the tail
    pub async fn enqueue(&self, judge_id: JudgeId) -> EngineResult<()> {
        retry_on_conflict(&self.retry, "enqueue", || self.try_enqueue(judge_id))
            .await
            .map_err(log_structural)?;
        judge_info!(judge_id, "enqueue", "joined rotation");
        Ok(())
    }

    /// Unlink a judge and mark it inactive
    pub async fn remove(&self, judge_id: JudgeId) -> EngineResult<()> {
        retry_on_conflict(&self.retry, "remove", || self.try_remove(judge_id))
            .await
            .map_err(log_structural)?;
        judge_info!(judge_id, "remove", "left rotation");
        Ok(())
    }

    /// Move a judge to the tail after it has been served
    pub async fn rotate(&self, judge_id: JudgeId) -> EngineResult<()> {
        retry_on_conflict(&self.retry, "rotate", || self.try_rotate(judge_id))
            .await
            .map_err(log_structural)?;
        judge_debug!(judge_id, "rotate", "moved to tail");
        Ok(())
    }

    /// Walk the cycle from the head and check it covers exactly the active judges
    pub async fn traverse(&self) -> EngineResult<Vec<JudgeId>> {
        retry_on_conflict(&self.retry, "traverse", || self.try_traverse())
            .await
            .map_err(log_structural)
    }

    async fn try_enqueue(&self, judge_id: JudgeId) -> EngineResult<()> {
        let mut links = self.load(&[judge_id], "enqueue").await?;
        let judge = links.judge(&judge_id)?;
        if judge.is_linked() {
            return Err(EngineError::AlreadyQueued { judge_id });
        }

        let head = match links.head.value {
            None => {
                links.edit(judge_id, |j| {
                    j.next = Some(judge_id);
                    j.prev = Some(judge_id);
                    j.active = true;
                })?;
                HeadUpdate::Set(Some(judge_id))
            }
            Some(head) if head == judge_id => {
                return Err(EngineError::corrupted(judge_id, "enqueue", "unlinked judge is the head"));
            }
            Some(head) => {
                let tail = links.judge(&head)?.prev.ok_or_else(|| {
                    EngineError::corrupted(head, "enqueue", "head has no prev")
                })?;
                if links.judge(&tail)?.next != Some(head) {
                    return Err(EngineError::corrupted(tail, "enqueue", "tail does not point at head"));
                }
                links.edit(judge_id, |j| {
                    j.prev = Some(tail);
                    j.next = Some(head);
                    j.active = true;
                })?;
                links.edit(tail, |t| t.next = Some(judge_id))?;
                links.edit(head, |h| h.prev = Some(judge_id))?;
                HeadUpdate::Keep
            }
        };

        self.store.commit_links(links.into_batch(head)).await
    }

    async fn try_remove(&self, judge_id: JudgeId) -> EngineResult<()> {
        let mut links = self.load(&[judge_id], "remove").await?;
        let judge = links.judge(&judge_id)?;
        let (prev, next) = match (judge.prev, judge.next) {
            (Some(prev), Some(next)) => (prev, next),
            (None, None) => return Err(EngineError::NotQueued { judge_id }),
            _ => return Err(EngineError::corrupted(judge_id, "remove", "half-linked judge")),
        };
        let current_head = links.head.value.ok_or_else(|| {
            EngineError::corrupted(judge_id, "remove", "judge linked while head is unset")
        })?;

        let head = if prev == judge_id || next == judge_id {
            if prev != next || current_head != judge_id {
                return Err(EngineError::corrupted(judge_id, "remove", "broken self-loop"));
            }
            HeadUpdate::Set(None)
        } else {
            if links.judge(&prev)?.next != Some(judge_id) {
                return Err(EngineError::corrupted(prev, "remove", "prev.next does not point back"));
            }
            if links.judge(&next)?.prev != Some(judge_id) {
                return Err(EngineError::corrupted(next, "remove", "next.prev does not point back"));
            }
            links.edit(prev, |p| p.next = Some(next))?;
            links.edit(next, |n| n.prev = Some(prev))?;
            if current_head == judge_id {
                HeadUpdate::Set(Some(next))
            } else {
                HeadUpdate::Keep
            }
        };

        links.edit(judge_id, |j| {
            j.next = None;
            j.prev = None;
            j.active = false;
        })?;

        self.store.commit_links(links.into_batch(head)).await
    }

    async fn try_rotate(&self, judge_id: JudgeId) -> EngineResult<()> {
        let mut links = self.load(&[judge_id], "rotate").await?;
        let judge = links.judge(&judge_id)?;
        let (prev, next) = match (judge.prev, judge.next) {
            (Some(prev), Some(next)) => (prev, next),
            (None, None) => return Err(EngineError::NotQueued { judge_id }),
            _ => return Err(EngineError::corrupted(judge_id, "rotate", "half-linked judge")),
        };
        let head = links.head.value.ok_or_else(|| {
            EngineError::corrupted(judge_id, "rotate", "judge linked while head is unset")
        })?;

        if head == judge_id {
            if next == judge_id {
                return Ok(());
            }
            return self
                .store
                .commit_links(links.into_batch(HeadUpdate::Set(Some(next))))
                .await;
        }

        let tail = links.judge(&head)?.prev.ok_or_else(|| {
            EngineError::corrupted(head, "rotate", "head has no prev")
        })?;
        if tail == judge_id {
            return Ok(());
        }
        if links.judge(&prev)?.next != Some(judge_id) {
            return Err(EngineError::corrupted(prev, "rotate", "prev.next does not point back"));
        }
        if links.judge(&next)?.prev != Some(judge_id) {
            return Err(EngineError::corrupted(next, "rotate", "next.prev does not point back"));
        }
        if links.judge(&tail)?.next != Some(head) {
            return Err(EngineError::corrupted(tail, "rotate", "tail does not point at head"));
        }

        links.edit(prev, |p| p.next = Some(next))?;
        links.edit(next, |n| n.prev = Some(prev))?;
        links.edit(tail, |t| t.next = Some(judge_id))?;
        links.edit(head, |h| h.prev = Some(judge_id))?;
        links.edit(judge_id, |j| {
            j.prev = Some(tail);
            j.next = Some(head);
        })?;

        self.store.commit_links(links.into_batch(HeadUpdate::Keep)).await
    }

    async fn try_traverse(&self) -> EngineResult<Vec<JudgeId>> {
        let ids: Vec<JudgeId> = self
            .store
            .list_judges()
            .await?
            .into_iter()
            .map(|j| j.value.id)
            .collect();
        let snapshot = self.store.link_snapshot(&ids).await?;
        let judges: HashMap<JudgeId, Judge> = snapshot
            .judges
            .into_iter()
            .map(|j| (j.value.id, j.value))
            .collect();

        // A judge registered between the two reads may be referenced but not loaded
        let lookup = |id: &JudgeId| judges.get(id).ok_or_else(EngineError::queue_conflict);

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        if let Some(head) = snapshot.head.value {
            let mut current = head;
            loop {
                let judge = lookup(&current)?;
                if !judge.active {
                    return Err(EngineError::corrupted(current, "traverse", "inactive judge in cycle"));
                }
                let next = judge
                    .next
                    .ok_or_else(|| EngineError::corrupted(current, "traverse", "missing next"))?;
                if lookup(&next)?.prev != Some(current) {
                    return Err(EngineError::corrupted(next, "traverse", "back link mismatch"));
                }
                if !visited.insert(current) {
                    return Err(EngineError::corrupted(current, "traverse", "cycle skips the head"));
                }
                order.push(current);
                current = next;
                if current == head {
                    break;
                }
            }
        }

        let mut stray: BTreeSet<JudgeId> = judges
            .values()
            .filter(|j| j.active || j.is_linked())
            .map(|j| j.id)
            .collect();
        stray.retain(|id| !visited.contains(id));
        if let Some(judge_id) = stray.into_iter().next() {
            return Err(EngineError::corrupted(
                judge_id,
                "traverse",
                "active or linked judge outside the cycle",
            ));
        }

        Ok(order)
    }

    /// Read the head, the seeds, the seeds' neighbours and the tail in one snapshot
    async fn load(&self, seeds: &[JudgeId], operation: &'static str) -> EngineResult<Links> {
        let mut wanted: BTreeSet<JudgeId> = seeds.iter().copied().collect();

        for _ in 0..MAX_SNAPSHOT_ROUNDS {
            let ids: Vec<JudgeId> = wanted.iter().copied().collect();
            let snapshot = self.store.link_snapshot(&ids).await?;
            let read: HashMap<JudgeId, Versioned<Judge>> = snapshot
                .judges
                .into_iter()
                .map(|j| (j.value.id, j))
                .collect();

            for seed in seeds {
                if !read.contains_key(seed) {
                    return Err(EngineError::JudgeNotFound { judge_id: *seed });
                }
            }

            let mut needed = wanted.clone();
            for seed in seeds {
                if let Some(judge) = read.get(seed) {
                    needed.extend(judge.value.next);
                    needed.extend(judge.value.prev);
                }
            }
            if let Some(head) = snapshot.head.value {
                needed.insert(head);
                if let Some(judge) = read.get(&head) {
                    needed.extend(judge.value.prev);
                }
            }

            if needed == wanted {
                return Ok(Links {
                    head: snapshot.head,
                    read,
                    staged: HashMap::new(),
                    operation,
                });
            }
            wanted = needed;
        }

        Err(EngineError::queue_conflict())
    }
}

fn log_structural(err: EngineError) -> EngineError {
    if let EngineError::QueueCorrupted {
        judge_id,
        operation,
        detail,
    } = &err
    {
        judge_error!(judge_id, *operation, detail = %detail, "judge rotation corrupted");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use shared::{NewJudge, ReliabilityPrior};

    async fn setup(count: usize) -> (Arc<InMemoryStore>, QueueManager<InMemoryStore>, Vec<JudgeId>) {
        let store = Arc::new(InMemoryStore::new());
        let queue = QueueManager::new(store.clone(), RetryPolicy::default());
        let mut ids = Vec::new();
        for i in 0..count {
            let judge = Judge::new(
                NewJudge {
                    name: format!("judge-{i}"),
                    email: format!("judge{i}@example.com"),
                    notes: String::new(),
                },
                &ReliabilityPrior::default(),
            );
            ids.push(judge.id);
            store.insert_judge(judge).await.unwrap();
        }
        (store, queue, ids)
    }

    #[tokio::test]
    async fn test_enqueue_appends_at_tail() {
        let (store, queue, ids) = setup(3).await;
        for id in &ids {
            queue.enqueue(*id).await.unwrap();
        }

        assert_eq!(queue.traverse().await.unwrap(), ids);
        assert_eq!(queue.next_eligible_judge().await.unwrap(), ids[0]);
        assert!(store.get_judge(&ids[1]).await.unwrap().value.active);
    }

    #[tokio::test]
    async fn test_single_judge_links_to_itself() {
        let (store, queue, ids) = setup(1).await;
        queue.enqueue(ids[0]).await.unwrap();

        let judge = store.get_judge(&ids[0]).await.unwrap().value;
        assert_eq!(judge.next, Some(ids[0]));
        assert_eq!(judge.prev, Some(ids[0]));

        queue.rotate(ids[0]).await.unwrap();
        assert_eq!(queue.next_eligible_judge().await.unwrap(), ids[0]);
    }

    #[tokio::test]
    async fn test_enqueue_twice_is_rejected() {
        let (_store, queue, ids) = setup(2).await;
        queue.enqueue(ids[0]).await.unwrap();
        let err = queue.enqueue(ids[0]).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyQueued { judge_id } if judge_id == ids[0]));
    }

    #[tokio::test]
    async fn test_remove_relinks_neighbours() {
        let (store, queue, ids) = setup(4).await;
        for id in &ids {
            queue.enqueue(*id).await.unwrap();
        }

        queue.remove(ids[2]).await.unwrap();
        assert_eq!(queue.traverse().await.unwrap(), vec![ids[0], ids[1], ids[3]]);

        queue.remove(ids[0]).await.unwrap();
        assert_eq!(queue.next_eligible_judge().await.unwrap(), ids[1]);
        assert_eq!(queue.traverse().await.unwrap(), vec![ids[1], ids[3]]);

        let removed = store.get_judge(&ids[0]).await.unwrap().value;
        assert!(!removed.active);
        assert!(!removed.is_linked());
    }

    #[tokio::test]
    async fn test_remove_last_judge_empties_queue() {
        let (_store, queue, ids) = setup(1).await;
        queue.enqueue(ids[0]).await.unwrap();
        queue.remove(ids[0]).await.unwrap();

        assert!(matches!(queue.next_eligible_judge().await, Err(EngineError::EmptyQueue)));
        assert!(queue.traverse().await.unwrap().is_empty());
        assert!(matches!(
            queue.remove(ids[0]).await,
            Err(EngineError::NotQueued { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotate_moves_judge_to_tail() {
        let (_store, queue, ids) = setup(4).await;
        for id in &ids {
            queue.enqueue(*id).await.unwrap();
        }

        queue.rotate(ids[1]).await.unwrap();
        assert_eq!(queue.traverse().await.unwrap(), vec![ids[0], ids[2], ids[3], ids[1]]);

        queue.rotate(ids[0]).await.unwrap();
        assert_eq!(queue.traverse().await.unwrap(), vec![ids[2], ids[3], ids[1], ids[0]]);

        queue.rotate(ids[0]).await.unwrap();
        assert_eq!(queue.traverse().await.unwrap(), vec![ids[2], ids[3], ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_round_robin_serves_every_judge_once() {
        let (_store, queue, ids) = setup(5).await;
        for id in &ids {
            queue.enqueue(*id).await.unwrap();
        }

        let mut served = Vec::new();
        for _ in 0..ids.len() {
            let head = queue.next_eligible_judge().await.unwrap();
            served.push(head);
            queue.rotate(head).await.unwrap();
        }
        assert_eq!(served, ids);
    }

    #[tokio::test]
    async fn test_unknown_judge_is_not_found() {
        let (_store, queue, _ids) = setup(0).await;
        let err = queue.enqueue(JudgeId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::JudgeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_dangling_pointer_is_reported_not_repaired() {
        let (store, queue, ids) = setup(3).await;
        for id in &ids {
            queue.enqueue(*id).await.unwrap();
        }

        // Break the back link of the middle judge's successor
        let mut tail = store.get_judge(&ids[2]).await.unwrap();
        tail.value.prev = Some(ids[0]);
        store.save_judge(tail.value.clone(), tail.version).await.unwrap();

        let err = queue.remove(ids[1]).await.unwrap_err();
        assert!(err.is_structural());
        assert!(queue.traverse().await.unwrap_err().is_structural());

        let middle = store.get_judge(&ids[1]).await.unwrap().value;
        assert!(middle.is_linked());
    }
}
