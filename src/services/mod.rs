/// Offline-first facade over the scoring server and the pending queue.
pub mod data_manager;
/// Pure merge of partial updates into complete queue entries.
pub mod merge;
/// HTTP client for the scoring server endpoints.
pub mod scoring_api;
