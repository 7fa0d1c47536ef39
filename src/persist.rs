//! Persisted user settings and the debounced writer in front of them.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use directories::ProjectDirs;
use hashbrown::HashMap;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Error;

/// Async key-value storage for numeric settings.
pub trait KeyValueStore: Send + Sync + 'static {
    /// The stored value, or `None` if the key was never written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<f64>, Error>> + Send;

    fn put(&self, key: &str, value: f64) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Process-local store. Counts writes so callers can observe debouncing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, f64>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `value` under `key`.
    pub fn with_value(key: &str, value: f64) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    fn insert(&self, key: &str, value: f64) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_owned(), value);
    }

    /// Synchronous read, for inspection.
    pub fn value(&self, key: &str) -> Option<f64> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).copied()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<f64>, Error> {
        Ok(self.value(key))
    }

    async fn put(&self, key: &str, value: f64) -> Result<(), Error> {
        self.insert(key, value);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A store whose every operation fails, like browser storage in private mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<f64>, Error> {
        Err(Error::Persistence("storage unavailable".into()))
    }

    async fn put(&self, _key: &str, _value: f64) -> Result<(), Error> {
        Err(Error::Persistence("storage unavailable".into()))
    }
}

/// Settings kept as one flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.json` in the platform's per-user config directory.
    pub fn in_config_dir() -> Result<Self, Error> {
        let dirs = ProjectDirs::from("", "", "superears")
            .ok_or_else(|| Error::Persistence("no home directory".into()))?;
        Ok(Self::new(dirs.config_dir().join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(Error::Persistence(format!(
                    "{}: not a JSON object",
                    self.path.display()
                ))),
                Err(e) => Err(Error::Persistence(format!("{}: {e}", self.path.display()))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(Error::Persistence(format!("{}: {e}", self.path.display()))),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<f64>, Error> {
        let document = self.read_document().await?;
        Ok(document.get(key).and_then(Value::as_f64))
    }

    async fn put(&self, key: &str, value: f64) -> Result<(), Error> {
        let mut document = self.read_document().await?;
        let number = serde_json::Number::from_f64(value)
            .ok_or(Error::InvalidGainValue(value))?;
        document.insert(key.to_owned(), Value::Number(number));

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::Persistence(format!("{}: {e}", dir.display())))?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| Error::Persistence(e.to_string()))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), key, value, "setting saved");
        Ok(())
    }
}

/// Coalesces bursts of writes to one key into a single write of the last
/// value, issued once `delay` has passed without a new request.
///
/// Needs a tokio runtime; without one, [`schedule`](Self::schedule) drops the
/// write with a warning.
pub struct DebouncedWriter<S: KeyValueStore> {
    store: Arc<S>,
    key: String,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl<S: KeyValueStore> DebouncedWriter<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>, delay: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            delay,
            pending: None,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace any pending write with one of `value`.
    pub fn schedule(&mut self, value: f64) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(key = %self.key, "no async runtime, setting not saved");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let delay = self.delay;
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.put(&key, value).await {
                warn!(key = %key, "failed to save setting: {e}");
            }
        }));
    }

    /// True while a write is waiting out its delay or in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the pending write, if any, to land.
    pub async fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            // an aborted task is the only error here
            let _ = pending.await;
        }
    }
}
