//! Volatile queue backend, used for ephemeral sessions and tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{
    models::{JudgeQueueRecord, PersonId},
    queue_store::QueueStore,
    storage::{StorageError, StorageResult},
};

/// In-memory [`QueueStore`]; clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    records: Arc<DashMap<PersonId, JudgeQueueRecord>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryQueueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, mimicking exhausted storage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "memory queue store disabled".into(),
                io::Error::other("storage quota exceeded"),
            ))
        } else {
            Ok(())
        }
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self, judge: PersonId) -> BoxFuture<'static, StorageResult<Option<JudgeQueueRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_available()?;
            Ok(store.records.get(&judge).map(|record| record.clone()))
        })
    }

    fn save(&self, record: JudgeQueueRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_available()?;
            store.records.insert(record.judge_id, record);
            Ok(())
        })
    }
}
