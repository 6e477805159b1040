mod config;
mod error;
mod models;
mod store;

pub use config::FileStoreConfig;
pub use error::{FileStoreError, FileStoreResult};
pub use models::SCHEMA_VERSION;
pub use store::FileQueueStore;
