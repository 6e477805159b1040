//! Single entry point scoring views use to read heats and save scores.
//!
//! A save is attempted live while the tracker believes the network is up and
//! lands in the durable queue otherwise. The queue is uploaded in one batch
//! whenever connectivity returns.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        dirty_queue::DirtyQueue,
        models::{PersonId, StoredScore},
    },
    dto::{
        batch::BatchOutcome,
        heats::HeatsPayload,
        score::{KnownScore, OptimisticPatch, ScoreResponse, ScoreUpdate},
    },
    error::SyncError,
    services::{
        merge::{MergeContext, generate_optimistic_response, merge_for_offline},
        scoring_api::ScoringApi,
    },
    state::{
        CachedVersion, ConnectivityTracker, EventHub, Reconciler, SyncEvent, VersionMarker,
    },
};

/// What the queue keeps after a batch the server partially confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchClearPolicy {
    /// Any confirmation drops every uploaded entry, including the ones the server rejected.
    #[default]
    ClearAll,
    /// Only uploaded entries the server echoed as succeeded are dropped.
    SucceededOnly,
}

/// Result of [`DataManager::save_score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server stored the update and returned its authoritative state.
    Confirmed(ScoreResponse),
    /// The update was queued; apply the patch to the view right away.
    Queued(OptimisticPatch),
}

/// Offline-first synchronization facade.
pub struct DataManager {
    api: Arc<dyn ScoringApi>,
    queue: DirtyQueue,
    connectivity: Arc<ConnectivityTracker>,
    events: Arc<EventHub>,
    cache: CachedVersion,
    clear_policy: BatchClearPolicy,
    batch_gates: DashMap<PersonId, Arc<Mutex<()>>>,
}

impl DataManager {
    /// Wire the facade and register it as the tracker's reconciliation target.
    pub fn new(
        api: Arc<dyn ScoringApi>,
        queue: DirtyQueue,
        connectivity: Arc<ConnectivityTracker>,
        events: Arc<EventHub>,
        clear_policy: BatchClearPolicy,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            api,
            queue,
            connectivity,
            events,
            cache: CachedVersion::new(),
            clear_policy,
            batch_gates: DashMap::new(),
        });
        manager
            .connectivity
            .set_reconciler(Arc::downgrade(&manager) as std::sync::Weak<dyn Reconciler>);
        manager
    }

    /// Shared connectivity tracker.
    pub fn connectivity(&self) -> &Arc<ConnectivityTracker> {
        &self.connectivity
    }

    /// Hub publishing connectivity, pending-count and sync notifications.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Fetch the judge's heat list from the server.
    ///
    /// `force_refetch` is passed along for the hydration layer; this call always
    /// goes to the network.
    pub async fn fetch_heats(
        &self,
        judge: PersonId,
        force_refetch: bool,
    ) -> Result<HeatsPayload, SyncError> {
        debug!(judge, force_refetch, "fetching heats");
        match self.api.fetch_heats(judge).await {
            Ok(payload) => {
                self.cache.record(VersionMarker::from_payload(&payload));
                self.connectivity.report(true, Some(judge));
                Ok(payload)
            }
            Err(err) => {
                warn!(judge, error = %err, "heat fetch failed");
                self.connectivity.report(false, Some(judge));
                Err(err.into())
            }
        }
    }

    /// Save a score change, live when possible and through the durable queue otherwise.
    ///
    /// Only fails when the update is invalid or the queue itself cannot be written.
    pub async fn save_score(
        self: &Arc<Self>,
        judge: PersonId,
        update: ScoreUpdate,
        context: &MergeContext,
    ) -> Result<SaveOutcome, SyncError> {
        update.validate()?;

        if self.connectivity.is_connected() {
            match self.api.post_score(judge, update.clone()).await {
                Ok(response) => {
                    self.connectivity.report(true, Some(judge));
                    self.replay_confirmed(judge, &update, &response).await?;
                    return Ok(SaveOutcome::Confirmed(response));
                }
                Err(err) if err.is_protocol() => {
                    warn!(judge, heat = update.heat, error = %err, "malformed score response; queuing update");
                    self.connectivity.report(false, Some(judge));
                }
                Err(err) => {
                    info!(judge, heat = update.heat, error = %err, "live score save failed; queuing update");
                    self.connectivity.report(false, Some(judge));
                }
            }
        }

        self.queue
            .upsert_with(judge, update.heat, update.slot, |pending| match pending {
                Some(pending) => {
                    merge_for_offline(&update, &context.with_current(KnownScore::from(pending)))
                }
                None => merge_for_offline(&update, context),
            })
            .await?;
        Ok(SaveOutcome::Queued(generate_optimistic_response(&update)))
    }

    /// Keep a just-confirmed value in front of an older backlog, then upload everything.
    async fn replay_confirmed(
        self: &Arc<Self>,
        judge: PersonId,
        update: &ScoreUpdate,
        response: &ScoreResponse,
    ) -> Result<(), SyncError> {
        if self.queue.count(judge).await? == 0 {
            return Ok(());
        }

        self.queue
            .upsert(judge, update.heat, update.slot, response.to_fields())
            .await?;
        debug!(judge, heat = update.heat, "backlog pending; confirmed score joins the batch");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = manager.sync_now(judge).await {
                error!(judge, error = %err, "background batch upload failed");
            }
        });
        Ok(())
    }

    /// Upload the judge's whole queue in one request.
    ///
    /// Any confirmation drops the cached heat version. Transport failures tag
    /// every entry as failed and leave the queue untouched. Only storage
    /// failures are returned as errors.
    pub async fn batch_upload(&self, judge: PersonId) -> Result<BatchOutcome, SyncError> {
        let gate = self.batch_gates.entry(judge).or_default().clone();
        let _guard = gate.lock().await;

        let scores = self.queue.list(judge).await?;
        if scores.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let batch_id = Uuid::new_v4();
        info!(judge, %batch_id, entries = scores.len(), "uploading pending scores");

        let response = match self.api.post_batch(judge, scores.clone()).await {
            Ok(response) => response,
            Err(err) => {
                warn!(judge, %batch_id, error = %err, "batch upload failed; keeping queue");
                self.connectivity.report(false, Some(judge));
                return Ok(BatchOutcome::all_failed(scores, &err.to_string()));
            }
        };
        self.connectivity.report(true, Some(judge));

        let outcome = BatchOutcome::from_response(&scores, &response);
        if outcome.confirmed == 0 {
            warn!(judge, %batch_id, failed = outcome.failed.len(), "batch upload confirmed nothing");
            return Ok(outcome);
        }

        // Only the uploaded copies are dropped; saves landing during the POST stay queued.
        let cleared = match self.clear_policy {
            BatchClearPolicy::ClearAll => self.queue.remove_confirmed(judge, &scores).await?,
            BatchClearPolicy::SucceededOnly => {
                self.queue
                    .remove_confirmed(judge, &outcome.succeeded)
                    .await?
            }
        };
        self.invalidate_cache();

        if outcome.failed.is_empty() {
            info!(judge, %batch_id, confirmed = outcome.confirmed, cleared, "pending scores synced");
        } else {
            warn!(
                judge, %batch_id,
                confirmed = outcome.confirmed,
                failed = outcome.failed.len(),
                cleared,
                policy = ?self.clear_policy,
                "batch upload partially failed"
            );
        }
        self.events.broadcast(SyncEvent::ScoresSynced {
            judge,
            succeeded: outcome.confirmed,
            failed: outcome.failed.len(),
        });
        Ok(outcome)
    }

    /// Manual "retry now": upload whatever is pending for the judge.
    pub async fn sync_now(&self, judge: PersonId) -> Result<BatchOutcome, SyncError> {
        debug!(judge, "manual sync requested");
        self.batch_upload(judge).await
    }

    /// Number of unconfirmed scores for the judge.
    pub async fn pending_count(&self, judge: PersonId) -> Result<usize, SyncError> {
        Ok(self.queue.count(judge).await?)
    }

    /// Unconfirmed scores for the judge.
    pub async fn pending_scores(&self, judge: PersonId) -> Result<Vec<StoredScore>, SyncError> {
        Ok(self.queue.list(judge).await?)
    }

    /// Force the next navigation to refetch heat data.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Version of the last fetched heat list, `None` after invalidation.
    pub fn cached_version(&self) -> Option<VersionMarker> {
        self.cache.get()
    }

    /// Subscribe to cache version changes.
    pub fn cache_watcher(&self) -> watch::Receiver<Option<VersionMarker>> {
        self.cache.watcher()
    }
}

impl Reconciler for DataManager {
    fn reconcile(self: Arc<Self>, judge: PersonId) -> BoxFuture<'static, usize> {
        Box::pin(async move {
            match self.batch_upload(judge).await {
                Ok(outcome) => outcome.confirmed,
                Err(err) => {
                    error!(judge, error = %err, "reconciliation could not read the pending queue");
                    0
                }
            }
        })
    }

    fn invalidate_cache(&self) {
        self.cache.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            models::ScoreFields,
            queue_store::{QueueStore, memory::MemoryQueueStore},
        },
        dto::batch::BatchResponse,
        services::scoring_api::{ApiError, ApiResult},
    };
    use reqwest::StatusCode;
    use serde_json::json;
    use std::{
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };
    use tokio::{
        sync::{Notify, broadcast, mpsc},
        time::timeout,
    };

    const JUDGE: PersonId = 42;
    const WAIT: Duration = Duration::from_secs(2);

    struct FakeApi {
        reachable: AtomicBool,
        malformed: AtomicBool,
        response: StdMutex<ScoreResponse>,
        batch_reply: StdMutex<Option<BatchResponse>>,
        batch_hold: StdMutex<Option<Arc<Notify>>>,
        posted: StdMutex<Vec<ScoreUpdate>>,
        batches: mpsc::UnboundedSender<Vec<StoredScore>>,
    }

    impl FakeApi {
        fn unreachable(path: &str) -> ApiError {
            ApiError::RequestStatus {
                path: path.into(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            }
        }

        fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        fn posted(&self) -> Vec<ScoreUpdate> {
            self.posted.lock().unwrap().clone()
        }
    }

    impl ScoringApi for FakeApi {
        fn post_score(
            &self,
            _judge: PersonId,
            update: ScoreUpdate,
        ) -> BoxFuture<'static, ApiResult<ScoreResponse>> {
            self.posted.lock().unwrap().push(update);
            let result = if !self.reachable.load(Ordering::SeqCst) {
                Err(Self::unreachable("scores/42/post"))
            } else if self.malformed.load(Ordering::SeqCst) {
                let source = reqwest::Client::new().get("::not a url").build().unwrap_err();
                Err(ApiError::DecodeResponse {
                    path: "scores/42/post".into(),
                    source,
                })
            } else {
                Ok(self.response.lock().unwrap().clone())
            };
            Box::pin(async move { result })
        }

        fn post_batch(
            &self,
            _judge: PersonId,
            scores: Vec<StoredScore>,
        ) -> BoxFuture<'static, ApiResult<BatchResponse>> {
            let result = if self.reachable.load(Ordering::SeqCst) {
                let reply = self.batch_reply.lock().unwrap().clone().unwrap_or_else(|| {
                    BatchResponse {
                        succeeded: scores
                            .iter()
                            .map(|score| json!({ "heat": score.heat, "slot": score.slot }))
                            .collect(),
                        failed: Vec::new(),
                    }
                });
                let _ = self.batches.send(scores);
                Ok(reply)
            } else {
                Err(Self::unreachable("scores/42/batch"))
            };
            let hold = self.batch_hold.lock().unwrap().clone();
            Box::pin(async move {
                if let Some(hold) = hold {
                    hold.notified().await;
                }
                result
            })
        }

        fn fetch_heats(&self, _judge: PersonId) -> BoxFuture<'static, ApiResult<HeatsPayload>> {
            let result = if self.reachable.load(Ordering::SeqCst) {
                Ok(serde_json::from_value(json!({
                    "heats": [
                        { "number": 1, "updated_at": "2025-03-01T10:00:00Z" },
                        { "number": 2, "updated_at": "2025-03-01T11:00:00Z" }
                    ]
                }))
                .unwrap())
            } else {
                Err(Self::unreachable("scores/42/heats.json"))
            };
            Box::pin(async move { result })
        }
    }

    struct Harness {
        manager: Arc<DataManager>,
        api: Arc<FakeApi>,
        store: MemoryQueueStore,
        events: broadcast::Receiver<SyncEvent>,
        batches: mpsc::UnboundedReceiver<Vec<StoredScore>>,
    }

    fn harness(online: bool, policy: BatchClearPolicy) -> Harness {
        let (batches_tx, batches) = mpsc::unbounded_channel();
        let api = Arc::new(FakeApi {
            reachable: AtomicBool::new(online),
            malformed: AtomicBool::new(false),
            response: StdMutex::new(ScoreResponse::default()),
            batch_reply: StdMutex::new(None),
            batch_hold: StdMutex::new(None),
            posted: StdMutex::new(Vec::new()),
            batches: batches_tx,
        });
        let store = MemoryQueueStore::new();
        let hub = Arc::new(EventHub::new(64));
        let events = hub.subscribe();
        let queue = DirtyQueue::with_store(Arc::new(store.clone()) as Arc<dyn QueueStore>, hub.clone());
        let tracker = Arc::new(ConnectivityTracker::new(online, hub.clone()));
        let manager = DataManager::new(api.clone(), queue, tracker, hub, policy);

        Harness {
            manager,
            api,
            store,
            events,
            batches,
        }
    }

    impl Harness {
        async fn next_batch(&mut self) -> Vec<StoredScore> {
            timeout(WAIT, self.batches.recv())
                .await
                .expect("batch upload expected")
                .expect("fake api alive")
        }

        async fn wait_for_sync(&mut self) -> SyncEvent {
            timeout(WAIT, async {
                loop {
                    match self.events.recv().await {
                        Ok(event @ SyncEvent::ScoresSynced { .. }) => return event,
                        Ok(_) => continue,
                        Err(err) => panic!("event stream broken: {err}"),
                    }
                }
            })
            .await
            .expect("scores-synced expected")
        }

        async fn queue_offline(&self, heat: i64, score: &str) {
            let update = ScoreUpdate {
                score: Some(score.into()),
                ..ScoreUpdate::new(heat)
            };
            self.manager
                .save_score(JUDGE, update, &MergeContext::default())
                .await
                .unwrap();
        }
    }

    fn stored(heat: i64, slot: Option<u32>, fields: ScoreFields) -> (i64, Option<u32>, ScoreFields) {
        (heat, slot, fields)
    }

    fn summary(scores: &[StoredScore]) -> Vec<(i64, Option<u32>, ScoreFields)> {
        scores
            .iter()
            .map(|score| {
                stored(
                    score.heat,
                    score.slot,
                    ScoreFields {
                        score: score.score.clone(),
                        comments: score.comments.clone(),
                        good: score.good.clone(),
                        bad: score.bad.clone(),
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn offline_edits_collapse_and_upload_once_on_reconnect() {
        let mut h = harness(false, BatchClearPolicy::ClearAll);

        let first = h
            .manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    score: Some("B".into()),
                    ..ScoreUpdate::new(10)
                },
                &MergeContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            first,
            SaveOutcome::Queued(OptimisticPatch {
                heat: 10,
                value: Some("B".into()),
                ..OptimisticPatch::default()
            })
        );

        h.manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    comments: Some("nice frame".into()),
                    ..ScoreUpdate::new(10)
                },
                &MergeContext::default(),
            )
            .await
            .unwrap();

        let expected = vec![stored(
            10,
            None,
            ScoreFields {
                score: "B".into(),
                comments: "nice frame".into(),
                ..ScoreFields::default()
            },
        )];
        assert_eq!(summary(&h.manager.pending_scores(JUDGE).await.unwrap()), expected);
        assert!(h.api.posted().is_empty());

        h.api.set_reachable(true);
        let reconcile = h
            .manager
            .connectivity()
            .report(true, Some(JUDGE))
            .expect("reconnect triggers reconciliation");
        reconcile.await.unwrap();

        assert_eq!(summary(&h.next_batch().await), expected);
        assert!(h.batches.try_recv().is_err());
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
        assert_eq!(
            h.wait_for_sync().await,
            SyncEvent::ScoresSynced {
                judge: JUDGE,
                succeeded: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn successful_fetch_after_outage_drains_queue_and_invalidates_cache() {
        let mut h = harness(false, BatchClearPolicy::ClearAll);
        h.queue_offline(3, "A").await;

        h.api.set_reachable(true);
        let payload = h.manager.fetch_heats(JUDGE, false).await.unwrap();
        assert_eq!(payload.heat_count(), 2);

        assert_eq!(h.next_batch().await.len(), 1);
        h.wait_for_sync().await;

        let mut watcher = h.manager.cache_watcher();
        timeout(WAIT, watcher.wait_for(|marker| marker.is_none()))
            .await
            .expect("cache invalidated after drain")
            .unwrap();
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn online_save_with_backlog_replays_server_values_in_the_batch() {
        let mut h = harness(false, BatchClearPolicy::ClearAll);
        h.queue_offline(1, "B").await;
        h.queue_offline(2, "C").await;

        h.api.set_reachable(true);
        *h.api.response.lock().unwrap() = ScoreResponse {
            value: Some("A".into()),
            comments: Some("server side".into()),
            good: None,
            bad: None,
        };
        h.manager.connectivity().report(true, None);

        let outcome = h
            .manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    score: Some("A-".into()),
                    ..ScoreUpdate::new(3)
                },
                &MergeContext::default(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Confirmed(ref response) if response.value.as_deref() == Some("A")));

        let batch = h.next_batch().await;
        assert_eq!(batch.len(), 3);
        let replayed = batch.iter().find(|score| score.heat == 3).unwrap();
        assert_eq!(replayed.score, "A");
        assert_eq!(replayed.comments, "server side");

        h.wait_for_sync().await;
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn online_save_without_backlog_leaves_queue_alone() {
        let mut h = harness(true, BatchClearPolicy::ClearAll);
        *h.api.response.lock().unwrap() = ScoreResponse {
            value: Some("B".into()),
            ..ScoreResponse::default()
        };

        let outcome = h
            .manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    score: Some("B".into()),
                    ..ScoreUpdate::new(8)
                },
                &MergeContext::default(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Confirmed(_)));
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
        tokio::task::yield_now().await;
        assert!(h.batches.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_live_save_queues_and_stops_trying_the_network() {
        let mut h = harness(true, BatchClearPolicy::ClearAll);
        h.api.set_reachable(false);

        let feedback = ScoreUpdate {
            good: Some("F".into()),
            ..ScoreUpdate::new(4)
        };
        let outcome = h
            .manager
            .save_score(JUDGE, feedback.clone(), &MergeContext::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Queued(OptimisticPatch {
                heat: 4,
                good: Some("F".into()),
                ..OptimisticPatch::default()
            })
        );
        assert!(!h.manager.connectivity().is_connected());
        assert_eq!(
            h.events.try_recv().unwrap(),
            SyncEvent::ConnectivityChanged {
                connected: false,
                was_connected: true
            }
        );

        h.manager
            .save_score(JUDGE, ScoreUpdate::new(5), &MergeContext::default())
            .await
            .unwrap();
        assert_eq!(h.api.posted(), vec![feedback]);
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn toggled_feedback_is_queued_with_full_state() {
        let h = harness(false, BatchClearPolicy::ClearAll);

        h.manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    good: Some("T".into()),
                    ..ScoreUpdate::new(6)
                },
                &MergeContext::Toggled {
                    current: KnownScore {
                        value: Some("2".into()),
                        good: Some("F".into()),
                        bad: Some("T".into()),
                        ..KnownScore::default()
                    },
                    resulting_good: "F T".into(),
                    resulting_bad: "".into(),
                },
            )
            .await
            .unwrap();

        let pending = h.manager.pending_scores(JUDGE).await.unwrap();
        assert_eq!(pending[0].score, "2");
        assert_eq!(pending[0].good, "F T");
        assert_eq!(pending[0].bad, "");
    }

    #[tokio::test]
    async fn malformed_response_is_treated_as_a_network_failure() {
        let h = harness(true, BatchClearPolicy::ClearAll);
        h.api.malformed.store(true, Ordering::SeqCst);

        let outcome = h
            .manager
            .save_score(
                JUDGE,
                ScoreUpdate {
                    score: Some("B".into()),
                    ..ScoreUpdate::new(9)
                },
                &MergeContext::default(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Queued(_)));
        assert!(!h.manager.connectivity().is_connected());
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_write_failure_is_the_only_save_error() {
        let h = harness(false, BatchClearPolicy::ClearAll);
        h.store.set_unavailable(true);

        let err = h
            .manager
            .save_score(JUDGE, ScoreUpdate::new(9), &MergeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn invalid_update_is_rejected_before_any_io() {
        let h = harness(true, BatchClearPolicy::ClearAll);

        let err = h
            .manager
            .save_score(JUDGE, ScoreUpdate::new(0), &MergeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidUpdate(_)));
        assert!(h.api.posted().is_empty());
    }

    #[tokio::test]
    async fn empty_queue_uploads_nothing() {
        let mut h = harness(true, BatchClearPolicy::ClearAll);

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(h.batches.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_failure_tags_every_entry_and_keeps_queue() {
        let h = harness(false, BatchClearPolicy::ClearAll);
        h.queue_offline(1, "B").await;
        h.queue_offline(2, "C").await;

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.failed.iter().all(|failed| failed.error.contains("503")));
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 2);
    }

    fn partial_reply() -> BatchResponse {
        BatchResponse {
            succeeded: vec![json!({ "heat": 1, "slot": null })],
            failed: vec![
                json!({ "heat": 2, "slot": null, "error": "heat locked" }),
                json!({ "heat": 3 }),
            ],
        }
    }

    #[tokio::test]
    async fn partial_success_clears_whole_queue_by_default() {
        let h = harness(false, BatchClearPolicy::ClearAll);
        for heat in 1..=3 {
            h.queue_offline(heat, "B").await;
        }
        h.api.set_reachable(true);
        *h.api.batch_reply.lock().unwrap() = Some(partial_reply());

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn succeeded_only_policy_keeps_rejected_entries() {
        let h = harness(false, BatchClearPolicy::SucceededOnly);
        for heat in 1..=3 {
            h.queue_offline(heat, "B").await;
        }
        h.api.set_reachable(true);
        *h.api.batch_reply.lock().unwrap() = Some(partial_reply());

        h.manager.batch_upload(JUDGE).await.unwrap();
        let heats: Vec<i64> = h
            .manager
            .pending_scores(JUDGE)
            .await
            .unwrap()
            .iter()
            .map(|score| score.heat)
            .collect();
        assert_eq!(heats, vec![2, 3]);
    }

    #[tokio::test]
    async fn fetch_records_version_and_failure_reports_offline() {
        let h = harness(true, BatchClearPolicy::ClearAll);

        h.manager.fetch_heats(JUDGE, true).await.unwrap();
        let marker = h.manager.cached_version().unwrap();
        assert_eq!(marker.heat_count, 2);
        assert_eq!(marker.max_updated_at.unwrap().hour(), 11);

        h.api.set_reachable(false);
        let err = h.manager.fetch_heats(JUDGE, false).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(!h.manager.connectivity().is_connected());
        assert_eq!(h.manager.cached_version(), Some(marker));
    }

    #[tokio::test]
    async fn confirmed_upload_invalidates_cache() {
        let h = harness(true, BatchClearPolicy::ClearAll);
        h.manager.fetch_heats(JUDGE, false).await.unwrap();
        h.manager.connectivity().report(false, None);
        h.queue_offline(1, "B").await;
        assert!(h.manager.cached_version().is_some());

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert_eq!(outcome.succeeded.len(), 1);
        assert!(h.manager.cached_version().is_none());

        h.manager.fetch_heats(JUDGE, false).await.unwrap();
        let outcome = h.manager.sync_now(JUDGE).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(h.manager.cached_version().is_some());
    }

    #[tokio::test]
    async fn save_during_batch_post_stays_queued() {
        let mut h = harness(false, BatchClearPolicy::ClearAll);
        h.queue_offline(1, "B").await;
        h.api.set_reachable(true);
        let hold = Arc::new(Notify::new());
        *h.api.batch_hold.lock().unwrap() = Some(hold.clone());

        let upload = tokio::spawn({
            let manager = h.manager.clone();
            async move { manager.batch_upload(JUDGE).await }
        });
        assert_eq!(h.next_batch().await.len(), 1);

        h.queue_offline(7, "A").await;
        h.queue_offline(1, "C").await;
        hold.notify_one();

        let outcome = upload.await.unwrap().unwrap();
        assert_eq!(outcome.confirmed, 1);

        let pending: Vec<(i64, String)> = h
            .manager
            .pending_scores(JUDGE)
            .await
            .unwrap()
            .into_iter()
            .map(|score| (score.heat, score.score))
            .collect();
        assert_eq!(pending, vec![(1, "C".to_string()), (7, "A".to_string())]);
    }

    #[tokio::test]
    async fn any_reported_success_clears_under_default_policy() {
        let h = harness(false, BatchClearPolicy::ClearAll);
        for heat in 1..=3 {
            h.queue_offline(heat, "B").await;
        }
        h.api.set_reachable(true);
        *h.api.batch_reply.lock().unwrap() = Some(BatchResponse {
            succeeded: vec![json!({ "heat_id": 99 })],
            failed: Vec::new(),
        });

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.confirmed, 1);
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unmatched_echo_keeps_queue_under_succeeded_only() {
        let h = harness(false, BatchClearPolicy::SucceededOnly);
        h.queue_offline(1, "B").await;
        h.api.set_reachable(true);
        *h.api.batch_reply.lock().unwrap() = Some(BatchResponse {
            succeeded: vec![json!("1-1")],
            failed: Vec::new(),
        });

        let outcome = h.manager.batch_upload(JUDGE).await.unwrap();
        assert_eq!(outcome.confirmed, 1);
        assert_eq!(h.manager.pending_count(JUDGE).await.unwrap(), 1);
    }
}
