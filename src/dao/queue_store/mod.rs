pub mod file;
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::{
    models::{JudgeQueueRecord, PersonId},
    storage::StorageResult,
};

/// Storage namespace holding one [`JudgeQueueRecord`] per judge.
///
/// Backends only load and replace whole records; read-modify-write sequencing
/// lives in [`crate::dao::dirty_queue::DirtyQueue`].
pub trait QueueStore: Send + Sync {
    fn load(&self, judge: PersonId) -> BoxFuture<'static, StorageResult<Option<JudgeQueueRecord>>>;
    fn save(&self, record: JudgeQueueRecord) -> BoxFuture<'static, StorageResult<()>>;
}
