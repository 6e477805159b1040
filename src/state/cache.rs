use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::debug;

use crate::dto::heats::HeatsPayload;

/// Fingerprint of the last heat payload fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    /// Latest heat `updated_at` seen in the payload.
    pub max_updated_at: Option<OffsetDateTime>,
    /// Number of heats in the payload.
    pub heat_count: usize,
}

impl VersionMarker {
    /// Derive the marker from a freshly fetched payload.
    pub fn from_payload(payload: &HeatsPayload) -> Self {
        Self {
            max_updated_at: payload.max_updated_at(),
            heat_count: payload.heat_count(),
        }
    }

    /// Whether two markers describe different server states.
    pub fn differs_from(&self, other: &VersionMarker) -> bool {
        self != other
    }
}

/// Process-wide cache version; written by the data manager only.
pub struct CachedVersion {
    marker: watch::Sender<Option<VersionMarker>>,
}

impl CachedVersion {
    /// Start with no cached version, forcing the first navigation to fetch.
    pub fn new() -> Self {
        let (marker, _rx) = watch::channel(None);
        Self { marker }
    }

    /// Current marker, `None` when invalidated or never fetched.
    pub fn get(&self) -> Option<VersionMarker> {
        self.marker.borrow().clone()
    }

    /// Subscribe to marker changes.
    pub fn watcher(&self) -> watch::Receiver<Option<VersionMarker>> {
        self.marker.subscribe()
    }

    pub(crate) fn record(&self, marker: VersionMarker) {
        debug!(heats = marker.heat_count, "cached heat version updated");
        self.marker.send_replace(Some(marker));
    }

    pub(crate) fn invalidate(&self) {
        if self.marker.send_replace(None).is_some() {
            debug!("cached heat version invalidated");
        }
    }
}

impl Default for CachedVersion {
    fn default() -> Self {
        Self::new()
    }
}
