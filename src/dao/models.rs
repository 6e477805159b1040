use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Identifier of a heat on the scoring server.
pub type HeatId = i64;
/// Identifier of a person (judge or dancer) on the scoring server.
pub type PersonId = i64;
/// Position of a score inside a multi-slot heat (solos, multi-dance rounds).
pub type SlotNumber = u32;
/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Slot assumed for deduplication when an update does not name one.
pub const DEFAULT_SLOT: SlotNumber = 1;

/// Identity of a pending mutation: later writes replace earlier ones sharing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Heat the score belongs to.
    pub heat: HeatId,
    /// Normalized slot (`slot ?? 1`).
    pub slot: SlotNumber,
}

impl DedupKey {
    /// Build the key for a heat and a possibly missing slot.
    pub fn new(heat: HeatId, slot: Option<SlotNumber>) -> Self {
        Self {
            heat,
            slot: slot.unwrap_or(DEFAULT_SLOT),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.heat, self.slot)
    }
}

/// Resolved score fields, every one of them present (empty string when unknown).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFields {
    /// Letter or numeric grade.
    pub score: String,
    /// Free-form judge comments.
    pub comments: String,
    /// Space separated "good" feedback tags.
    pub good: String,
    /// Space separated "bad" feedback tags.
    pub bad: String,
}

/// Durable queue record: the latest unconfirmed state for one dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScore {
    /// Heat the score belongs to.
    pub heat: HeatId,
    /// Slot exactly as the caller supplied it; `None` still dedups as slot 1.
    pub slot: Option<SlotNumber>,
    /// Letter or numeric grade.
    pub score: String,
    /// Free-form judge comments.
    pub comments: String,
    /// Space separated "good" feedback tags.
    pub good: String,
    /// Space separated "bad" feedback tags.
    pub bad: String,
    /// Last time this entry was written locally.
    pub timestamp: EpochMillis,
}

impl StoredScore {
    /// Create a queue entry from resolved fields.
    pub fn new(
        heat: HeatId,
        slot: Option<SlotNumber>,
        fields: ScoreFields,
        timestamp: EpochMillis,
    ) -> Self {
        let ScoreFields {
            score,
            comments,
            good,
            bad,
        } = fields;
        Self {
            heat,
            slot,
            score,
            comments,
            good,
            bad,
            timestamp,
        }
    }

    /// Deduplication identity of this entry.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.heat, self.slot)
    }
}

/// Unit of durable storage: all pending scores of a single judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeQueueRecord {
    /// Judge owning the queue.
    pub judge_id: PersonId,
    /// Last time the record was written.
    pub timestamp: EpochMillis,
    /// Pending entries, at most one per dedup key.
    pub scores: Vec<StoredScore>,
}

impl JudgeQueueRecord {
    /// Empty record for a judge.
    pub fn new(judge_id: PersonId) -> Self {
        Self {
            judge_id,
            timestamp: now_millis(),
            scores: Vec::new(),
        }
    }

    /// Replace the entry sharing the dedup key in place, or append a new one.
    pub fn upsert(
        &mut self,
        heat: HeatId,
        slot: Option<SlotNumber>,
        fields: ScoreFields,
        now: EpochMillis,
    ) -> &StoredScore {
        let key = DedupKey::new(heat, slot);
        let entry = StoredScore::new(heat, slot, fields, now);
        self.timestamp = now;

        let index = match self.position(key) {
            Some(index) => {
                self.scores[index] = entry;
                index
            }
            None => {
                self.scores.push(entry);
                self.scores.len() - 1
            }
        };
        &self.scores[index]
    }

    /// Pending entry for the key, if any.
    pub fn get(&self, key: DedupKey) -> Option<&StoredScore> {
        self.position(key).map(|index| &self.scores[index])
    }

    /// Drop the entry matching the key. Returns whether anything was removed.
    pub fn remove(&mut self, key: DedupKey) -> bool {
        match self.position(key) {
            Some(index) => {
                self.scores.remove(index);
                self.timestamp = now_millis();
                true
            }
            None => false,
        }
    }

    /// Drop every entry while keeping the record itself.
    pub fn clear(&mut self) {
        self.scores.clear();
        self.timestamp = now_millis();
    }

    fn position(&self, key: DedupKey) -> Option<usize> {
        self.scores.iter().position(|entry| entry.dedup_key() == key)
    }
}

/// Current wall clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as EpochMillis)
        .unwrap_or_default()
}
