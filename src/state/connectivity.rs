//! Online/offline tracking driven by the outcome of real requests.
//!
//! The tracker never polls. Every request the data manager makes ends with a
//! [`ConnectivityTracker::report`] call, and the Offline→Online edge kicks off
//! reconciliation of the judge's pending queue.

use std::sync::{
    Arc, OnceLock, Weak,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dao::models::PersonId,
    state::events::{EventHub, SyncEvent},
};

/// Callbacks run when connectivity comes back.
pub trait Reconciler: Send + Sync {
    /// Upload everything pending for `judge`, returning how many entries the server confirmed.
    fn reconcile(self: Arc<Self>, judge: PersonId) -> BoxFuture<'static, usize>;
    /// Drop cached heat data so the next navigation refetches.
    fn invalidate_cache(&self);
}

/// Process-wide reachability state. Construct one and share it by handle.
pub struct ConnectivityTracker {
    connected: watch::Sender<bool>,
    reported: AtomicBool,
    reconciler: OnceLock<Weak<dyn Reconciler>>,
    events: Arc<EventHub>,
}

impl ConnectivityTracker {
    /// Create a tracker seeded with the platform's coarse reachability hint.
    pub fn new(initially_connected: bool, events: Arc<EventHub>) -> Self {
        let (connected, _rx) = watch::channel(initially_connected);
        Self {
            connected,
            reported: AtomicBool::new(false),
            reconciler: OnceLock::new(),
            events,
        }
    }

    /// Whether the last known request outcome (or the initial hint) says we are online.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Subscribe to connectivity flips.
    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Install the reconciliation target. Only the first installation is kept.
    pub fn set_reconciler(&self, reconciler: Weak<dyn Reconciler>) {
        if self.reconciler.set(reconciler).is_err() {
            warn!("connectivity reconciler already installed; ignoring replacement");
        }
    }

    /// Apply a platform online/offline hint.
    ///
    /// Hints only seed the state until the first real request outcome has been reported.
    pub fn advise(&self, online: bool) {
        if self.reported.load(Ordering::SeqCst) {
            debug!(online, "ignoring platform reachability hint after a real request outcome");
            return;
        }
        self.connected.send_replace(online);
    }

    /// Record the outcome of a real request.
    ///
    /// Emits `connectivity-changed` on a flip. On Offline→Online with a judge in
    /// context, spawns reconciliation and returns its handle; callers are free to
    /// drop it.
    pub fn report(&self, connected: bool, judge: Option<PersonId>) -> Option<JoinHandle<()>> {
        self.reported.store(true, Ordering::SeqCst);

        let mut was_connected = connected;
        let changed = self.connected.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            was_connected = *current;
            *current = connected;
            true
        });
        if !changed {
            return None;
        }

        if connected {
            info!(?judge, "network reachable again");
        } else {
            warn!(?judge, "network unreachable; switching to offline queue");
        }
        self.events.broadcast(SyncEvent::ConnectivityChanged {
            connected,
            was_connected,
        });

        if !connected {
            return None;
        }
        let judge = judge?;
        let Some(reconciler) = self.reconciler.get().and_then(Weak::upgrade) else {
            debug!(judge, "no reconciler installed; skipping queue upload");
            return None;
        };

        Some(tokio::spawn(async move {
            let succeeded = Arc::clone(&reconciler).reconcile(judge).await;
            if succeeded > 0 {
                reconciler.invalidate_cache();
            }
        }))
    }
}
