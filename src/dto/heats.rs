use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;

const UPDATED_AT: &str = "updated_at";

/// Denormalized heat list served to a judge.
///
/// Heat contents belong to the hydration layer; only `updated_at` and the
/// heat count are read here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatsPayload {
    /// Judge the heat list was built for.
    #[serde(default)]
    pub judge: Value,
    /// Event settings.
    #[serde(default)]
    pub event: Value,
    /// Heats in running order.
    #[serde(default)]
    pub heats: Vec<Value>,
    /// Feedback option catalog (good/bad tags) for the event.
    #[serde(default)]
    pub feedbacks: Value,
}

impl HeatsPayload {
    /// Number of heats in the payload.
    pub fn heat_count(&self) -> usize {
        self.heats.len()
    }

    /// Most recent `updated_at` across all heats, skipping missing or unparseable values.
    pub fn max_updated_at(&self) -> Option<OffsetDateTime> {
        self.heats
            .iter()
            .filter_map(|heat| heat.get(UPDATED_AT)?.as_str())
            .filter_map(|raw| match OffsetDateTime::parse(raw, &Rfc3339) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!(value = raw, error = %err, "ignoring unparseable heat timestamp");
                    None
                }
            })
            .max()
    }
}
