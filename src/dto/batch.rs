use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{DedupKey, SlotNumber, StoredScore};

/// Body of `POST /scores/{judge}/batch`.
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub scores: &'a [StoredScore],
}

/// Server verdict on a batch upload.
///
/// Entry shapes are not fixed by the server contract; keys are extracted on a
/// best-effort basis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub succeeded: Vec<Value>,
    #[serde(default)]
    pub failed: Vec<Value>,
}

/// Dedup key of an echoed entry, when it carries a numeric `heat`.
pub fn echoed_key(entry: &Value) -> Option<DedupKey> {
    let heat = entry.get("heat")?.as_i64()?;
    let slot = entry
        .get("slot")
        .and_then(Value::as_u64)
        .and_then(|slot| SlotNumber::try_from(slot).ok());
    Some(DedupKey::new(heat, slot))
}

/// Queue entry that could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedScore {
    #[serde(flatten)]
    pub score: StoredScore,
    pub error: String,
}

/// Result of a batch upload, expressed in terms of the uploaded queue entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Uploaded entries the server echoed as succeeded.
    pub succeeded: Vec<StoredScore>,
    /// Uploaded entries the server rejected or that never reached it.
    pub failed: Vec<FailedScore>,
    /// Length of the server's `succeeded` list, whether or not its entries could be matched.
    pub confirmed: usize,
}

impl BatchOutcome {
    /// Every uploaded entry tagged with the same transport error.
    pub fn all_failed(scores: Vec<StoredScore>, error: &str) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: scores
                .into_iter()
                .map(|score| FailedScore {
                    score,
                    error: error.to_string(),
                })
                .collect(),
            confirmed: 0,
        }
    }

    /// Map the server's verdict back onto the entries that were uploaded.
    ///
    /// Echoed entries without a recognizable key, or matching no uploaded entry,
    /// only count towards [`BatchOutcome::confirmed`].
    pub fn from_response(uploaded: &[StoredScore], response: &BatchResponse) -> Self {
        let find = |entry: &Value| {
            echoed_key(entry)
                .and_then(|key| uploaded.iter().find(|score| score.dedup_key() == key))
        };

        let succeeded = response
            .succeeded
            .iter()
            .filter_map(|entry| find(entry).cloned())
            .collect();
        let failed = response
            .failed
            .iter()
            .filter_map(|entry| {
                find(entry).map(|score| FailedScore {
                    score: score.clone(),
                    error: entry
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("rejected by server")
                        .to_string(),
                })
            })
            .collect();

        Self {
            succeeded,
            failed,
            confirmed: response.succeeded.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{HeatId, ScoreFields};

    fn stored(heat: HeatId, slot: Option<SlotNumber>) -> StoredScore {
        StoredScore::new(heat, slot, ScoreFields::default(), 5)
    }

    #[test]
    fn response_is_mapped_onto_uploaded_entries() {
        let uploaded = vec![stored(1, None), stored(2, Some(2)), stored(3, None)];
        let response: BatchResponse = serde_json::from_value(serde_json::json!({
            "succeeded": [{ "heat": 1, "slot": 1 }, { "heat": 99 }],
            "failed": [{ "heat": 2, "slot": 2, "error": "heat closed" }, { "heat": 3 }]
        }))
        .unwrap();

        let outcome = BatchOutcome::from_response(&uploaded, &response);
        assert_eq!(outcome.succeeded, vec![stored(1, None)]);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].error, "heat closed");
        assert_eq!(outcome.failed[1].score, stored(3, None));
        assert_eq!(outcome.failed[1].error, "rejected by server");
        assert_eq!(outcome.confirmed, 2);
    }

    #[test]
    fn foreign_entry_shapes_still_count_as_confirmed() {
        let response: BatchResponse = serde_json::from_value(serde_json::json!({
            "succeeded": [{ "heat_id": 10, "slot": null }, "10-1"]
        }))
        .unwrap();

        let outcome = BatchOutcome::from_response(&[stored(10, None)], &response);
        assert!(outcome.succeeded.is_empty());
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.confirmed, 2);
    }

    #[test]
    fn echoed_keys_normalize_missing_slots() {
        let key = echoed_key(&serde_json::json!({ "heat": 4, "slot": null })).unwrap();
        assert_eq!(key, DedupKey::new(4, Some(1)));
        assert!(echoed_key(&serde_json::json!({ "heat": "4" })).is_none());
    }

    #[test]
    fn failed_entries_serialize_flat() {
        let outcome = BatchOutcome::all_failed(vec![stored(4, None)], "timed out");
        let json = serde_json::to_value(&outcome.failed[0]).unwrap();
        assert_eq!(json["heat"], 4);
        assert_eq!(json["error"], "timed out");
    }
}
