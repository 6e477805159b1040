use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::{debug, warn};

use crate::dao::{
    models::{JudgeQueueRecord, PersonId},
    queue_store::QueueStore,
    storage::StorageResult,
};

use super::{
    config::FileStoreConfig,
    error::{FileStoreError, FileStoreResult},
    models::{QueueEnvelope, RawEnvelope, SCHEMA_VERSION, TEMP_SUFFIX, record_file_name},
};

/// [`QueueStore`] keeping one JSON file per judge, replaced atomically on write.
#[derive(Clone)]
pub struct FileQueueStore {
    root: Arc<PathBuf>,
}

impl FileQueueStore {
    /// Open the store, creating the queue directory when missing.
    pub async fn connect(config: FileStoreConfig) -> FileStoreResult<Self> {
        fs::create_dir_all(&config.root)
            .await
            .map_err(|source| FileStoreError::CreateDir {
                path: config.root.clone(),
                source,
            })?;

        Ok(Self {
            root: Arc::new(config.root),
        })
    }

    fn record_path(&self, judge: PersonId) -> PathBuf {
        self.root.join(record_file_name(judge))
    }

    async fn read_record(&self, judge: PersonId) -> FileStoreResult<Option<JudgeQueueRecord>> {
        let path = self.record_path(judge);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FileStoreError::Read { path, source }),
        };

        let envelope: RawEnvelope = serde_json::from_slice(&contents)
            .map_err(|source| FileStoreError::Decode {
                path: path.clone(),
                source,
            })?;

        if envelope.version != SCHEMA_VERSION {
            warn!(
                path = %path.display(),
                found = envelope.version,
                expected = SCHEMA_VERSION,
                "discarding queue record written by another schema version"
            );
            return Ok(None);
        }

        serde_json::from_value(envelope.record)
            .map(Some)
            .map_err(|source| FileStoreError::Decode { path, source })
    }

    async fn write_record(&self, record: &JudgeQueueRecord) -> FileStoreResult<()> {
        let path = self.record_path(record.judge_id);
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_path);

        let envelope = QueueEnvelope {
            version: SCHEMA_VERSION,
            record,
        };
        let contents =
            serde_json::to_vec(&envelope).map_err(|source| FileStoreError::Encode {
                judge: record.judge_id,
                source,
            })?;

        fs::write(&temp_path, contents)
            .await
            .map_err(|source| FileStoreError::Write {
                path: temp_path.clone(),
                source,
            })?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|source| FileStoreError::Rename {
                path: path.clone(),
                source,
            })?;

        debug!(
            judge = record.judge_id,
            pending = record.scores.len(),
            "queue record written"
        );
        Ok(())
    }
}

impl QueueStore for FileQueueStore {
    fn load(&self, judge: PersonId) -> BoxFuture<'static, StorageResult<Option<JudgeQueueRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.read_record(judge).await.map_err(Into::into) })
    }

    fn save(&self, record: JudgeQueueRecord) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_record(&record).await.map_err(Into::into) })
    }
}
