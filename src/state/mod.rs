//! Shared runtime state: reachability, cache version, and UI notifications.

pub mod cache;
pub mod connectivity;
pub mod events;

pub use self::cache::{CachedVersion, VersionMarker};
pub use self::connectivity::{ConnectivityTracker, Reconciler};
pub use self::events::{EventHub, SyncEvent};
