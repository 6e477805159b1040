//! Runtime configuration for the sync engine: server location, queue directory and tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::data_manager::BatchClearPolicy;

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/sync.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCORING_SYNC_CONFIG_PATH";
const BASE_URL_ENV: &str = "SCORING_BASE_URL";
const QUEUE_DIR_ENV: &str = "SCORING_QUEUE_DIR";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_QUEUE_DIR: &str = "data/pending-scores";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Immutable runtime configuration shared across the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct SyncConfig {
    /// Root URL of the scoring server.
    #[validate(url)]
    pub base_url: String,
    /// Directory holding one pending-score file per judge.
    pub queue_dir: PathBuf,
    /// Upper bound for every HTTP request.
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
    /// Reachability assumed before the first request completes.
    pub assume_online: bool,
    /// What a partially confirmed batch leaves in the queue.
    pub batch_clear_policy: BatchClearPolicy,
    /// Buffer size of the event broadcast channel.
    #[validate(range(min = 1))]
    pub event_capacity: usize,
}

impl SyncConfig {
    /// Load the configuration from disk and the process environment, falling back to defaults.
    pub fn load() -> Self {
        Self::load_with(resolve_config_path(), |name| env::var(name).ok())
    }

    /// Load from `path`, applying overrides looked up through `lookup`.
    ///
    /// Any invalid result is replaced by the built-in defaults.
    pub fn load_with<F>(path: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::read_file(path).with_overrides(lookup);
        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(error = %err, "invalid sync config; falling back to defaults");
                Self::default()
            }
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn read_file(path: PathBuf) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        base_url = %config.base_url,
                        "loaded sync config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.is_empty());
        if let Some(base_url) = present(BASE_URL_ENV) {
            self.base_url = base_url;
        }
        if let Some(queue_dir) = present(QUEUE_DIR_ENV) {
            self.queue_dir = PathBuf::from(queue_dir);
        }
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            queue_dir: PathBuf::from(DEFAULT_QUEUE_DIR),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            assume_online: true,
            batch_clear_policy: BatchClearPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
