/// Judge-scoped durable queue of unconfirmed score mutations.
pub mod dirty_queue;
/// Queue record definitions.
pub mod models;
/// Storage backends holding one queue record per judge.
pub mod queue_store;
/// Storage error shared by every backend.
pub mod storage;
