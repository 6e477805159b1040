use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{JudgeQueueRecord, PersonId};

/// Version of the on-disk record layout. Bumping it discards older files.
pub const SCHEMA_VERSION: u32 = 2;

pub const RECORD_PREFIX: &str = "judge-";
pub const RECORD_SUFFIX: &str = ".json";
pub const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Serialize)]
pub struct QueueEnvelope<'a> {
    pub version: u32,
    pub record: &'a JudgeQueueRecord,
}

/// Envelope read back from disk; the record is decoded only once the version matches.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(default)]
    pub version: u32,
    pub record: Value,
}

pub fn record_file_name(judge: PersonId) -> String {
    format!("{RECORD_PREFIX}{judge}{RECORD_SUFFIX}")
}
