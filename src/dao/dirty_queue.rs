//! Durable queue of score mutations the server has not confirmed yet.
//!
//! One record per judge, at most one entry per `(heat, slot ?? 1)`. Every
//! read-modify-write holds the judge's async mutex so rapid saves to the same
//! field cannot lose updates, whatever the backend.

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::{
    dao::{
        models::{
            DedupKey, HeatId, JudgeQueueRecord, PersonId, ScoreFields, SlotNumber, StoredScore,
            now_millis,
        },
        queue_store::QueueStore,
        storage::StorageResult,
    },
    state::events::{EventHub, SyncEvent},
};

type StoreOpener =
    Box<dyn Fn() -> BoxFuture<'static, StorageResult<Arc<dyn QueueStore>>> + Send + Sync>;

/// Judge-scoped pending score queue over a lazily opened [`QueueStore`].
pub struct DirtyQueue {
    opener: StoreOpener,
    store: OnceCell<Arc<dyn QueueStore>>,
    locks: DashMap<PersonId, Arc<Mutex<()>>>,
    events: Arc<EventHub>,
}

impl DirtyQueue {
    /// Queue whose store is opened on first use.
    ///
    /// Concurrent first callers share a single open; a failed open is retried next time.
    pub fn new<F, Fut>(open: F, events: Arc<EventHub>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StorageResult<Arc<dyn QueueStore>>> + Send + 'static,
    {
        Self {
            opener: Box::new(move || Box::pin(open())),
            store: OnceCell::new(),
            locks: DashMap::new(),
            events,
        }
    }

    /// Queue over an already opened store.
    pub fn with_store(store: Arc<dyn QueueStore>, events: Arc<EventHub>) -> Self {
        Self {
            opener: Box::new({
                let store = store.clone();
                move || {
                    let store = store.clone();
                    Box::pin(async move { Ok(store) })
                }
            }),
            store: OnceCell::new_with(Some(store)),
            locks: DashMap::new(),
            events,
        }
    }

    async fn store(&self) -> StorageResult<Arc<dyn QueueStore>> {
        self.store
            .get_or_try_init(|| (self.opener)())
            .await
            .cloned()
    }

    fn judge_lock(&self, judge: PersonId) -> Arc<Mutex<()>> {
        self.locks.entry(judge).or_default().clone()
    }

    /// Insert or replace the entry for `(heat, slot ?? 1)`, refreshing its timestamp.
    pub async fn upsert(
        &self,
        judge: PersonId,
        heat: HeatId,
        slot: Option<SlotNumber>,
        fields: ScoreFields,
    ) -> StorageResult<StoredScore> {
        self.upsert_with(judge, heat, slot, |_| fields).await
    }

    /// Like [`DirtyQueue::upsert`], computing the fields from the entry currently
    /// pending for the key while the judge's lock is held.
    pub async fn upsert_with<F>(
        &self,
        judge: PersonId,
        heat: HeatId,
        slot: Option<SlotNumber>,
        resolve: F,
    ) -> StorageResult<StoredScore>
    where
        F: FnOnce(Option<&StoredScore>) -> ScoreFields,
    {
        let lock = self.judge_lock(judge);
        let _guard = lock.lock().await;
        let store = self.store().await?;

        let mut record = store
            .load(judge)
            .await?
            .unwrap_or_else(|| JudgeQueueRecord::new(judge));
        let fields = resolve(record.get(DedupKey::new(heat, slot)));
        let entry = record.upsert(heat, slot, fields, now_millis()).clone();
        let count = record.scores.len();
        store.save(record).await?;

        debug!(judge, heat, ?slot, pending = count, "score queued");
        self.publish_count(judge, count);
        Ok(entry)
    }

    /// Every pending entry for the judge, oldest key first.
    pub async fn list(&self, judge: PersonId) -> StorageResult<Vec<StoredScore>> {
        let store = self.store().await?;
        Ok(store
            .load(judge)
            .await?
            .map(|record| record.scores)
            .unwrap_or_default())
    }

    /// Number of pending entries for the judge.
    pub async fn count(&self, judge: PersonId) -> StorageResult<usize> {
        self.list(judge).await.map(|scores| scores.len())
    }

    /// Drop the entry for `(heat, slot ?? 1)`; a missing entry is not an error.
    pub async fn remove(
        &self,
        judge: PersonId,
        heat: HeatId,
        slot: Option<SlotNumber>,
    ) -> StorageResult<bool> {
        let key = DedupKey::new(heat, slot);
        self.mutate(judge, |record| record.remove(key)).await
    }

    /// Drop entries still identical to the given uploaded copies.
    ///
    /// Entries rewritten or added since the copies were taken stay queued.
    /// Returns how many entries were removed.
    pub async fn remove_confirmed(
        &self,
        judge: PersonId,
        confirmed: &[StoredScore],
    ) -> StorageResult<usize> {
        let mut removed = 0;
        self.mutate(judge, |record| {
            let before = record.scores.len();
            record
                .scores
                .retain(|pending| !confirmed.iter().any(|done| done == pending));
            removed = before - record.scores.len();
            removed > 0
        })
        .await?;
        Ok(removed)
    }

    /// Empty the judge's queue, keeping the record itself.
    pub async fn clear_all(&self, judge: PersonId) -> StorageResult<()> {
        self.mutate(judge, |record| {
            let had_scores = !record.scores.is_empty();
            record.clear();
            had_scores
        })
        .await
        .map(|_| ())
    }

    /// Apply `change` to an existing record and persist it when it reports a modification.
    async fn mutate<F>(&self, judge: PersonId, change: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut JudgeQueueRecord) -> bool,
    {
        let lock = self.judge_lock(judge);
        let _guard = lock.lock().await;
        let store = self.store().await?;

        let Some(mut record) = store.load(judge).await? else {
            return Ok(false);
        };
        if !change(&mut record) {
            return Ok(false);
        }
        let count = record.scores.len();
        store.save(record).await?;

        self.publish_count(judge, count);
        Ok(true)
    }

    fn publish_count(&self, judge: PersonId, count: usize) {
        self.events
            .broadcast(SyncEvent::PendingCountChanged { judge, count });
    }
}
