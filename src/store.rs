//! Core store type and builder.

use crate::error::{Error, Result};
use crate::gate::WatchGate;
use crate::notifier::ChangeNotifier;
use crate::persist::{atomic_write, ensure_parent_dir, load};
use crate::serializer::{JsonSerializer, Serializer};
use crate::watch::{FileWatch, Watch};
use crate::worker::ChangeWorker;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::{mpsc, Arc};
use tracing::{debug, trace, warn};

/// Keys `set` refuses to write. They shadow properties every JSON object
/// inherits in JavaScript, which is where these files often end up being read.
const RESERVED_KEYS: &[&str] = &[
    "__proto__",
    "__defineGetter__",
    "__defineSetter__",
    "__lookupGetter__",
    "__lookupSetter__",
    "constructor",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// State shared between the store handle and its worker thread.
struct Shared {
    path: PathBuf,
    serializer: Box<dyn Serializer>,
    cache: RwLock<Map<String, Value>>,
    // Serializes this instance's writes and reloads.
    io_lock: Mutex<()>,
    gate: Arc<WatchGate<FileWatch>>,
    notifier: ChangeNotifier,
}

impl Shared {
    fn reload(&self) -> Result<()> {
        let fresh = load(&self.path, self.serializer.as_ref())?;
        *self.cache.write() = fresh;
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let bytes = {
            let cache = self.cache.read();
            self.serializer.serialize(&cache)?
        };
        atomic_write(&self.path, &bytes)
    }

    /// Write the cache out with the watch paused. Caller holds `io_lock`.
    fn write_through(&self) -> Result<()> {
        let hold = self.gate.hold();
        let written = self.persist();
        let resumed = hold.release();
        written.and(resumed)
    }

    /// Worker entry point for a raw event from watch `generation`.
    fn on_raw_change(&self, generation: u64) {
        let io = self.io_lock.lock();
        let Some(hold) = self.gate.claim(generation) else {
            trace!(path = %self.path.display(), generation, "stale change event dropped");
            return;
        };
        let reloaded = self.reload();
        drop(io);

        match reloaded {
            Ok(()) => {
                debug!(path = %self.path.display(), generation, "reloaded after external change");
                self.notifier.emit();
            }
            Err(e) => warn!(path = %self.path.display(), "reload after external change failed: {e}"),
        }
        if let Err(e) = hold.release() {
            warn!(path = %self.path.display(), "failed to resume watch: {e}");
        }
    }
}

/// Key-value store persisted as one JSON object in a file.
///
/// Reads are served from an in-memory copy of the file. Writes update the
/// copy and rewrite the whole file. While at least one listener is
/// subscribed on [`changes`](Self::changes), the file is watched and changes
/// made by other instances or processes are reloaded and announced. The
/// store never announces its own writes.
///
/// Concurrent writers to the same file are last-write-wins.
pub struct JsonStore {
    shared: Arc<Shared>,
    worker: Option<ChangeWorker>,
}

impl JsonStore {
    /// Open (or create) a store at `path` with compact JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder(path).build()
    }

    /// Start configuring a new store. Call [`.build()`](JsonStoreBuilder::build)
    /// when ready.
    pub fn builder(path: impl AsRef<Path>) -> JsonStoreBuilder {
        JsonStoreBuilder::new(path)
    }

    // ---- reads ----

    /// Owned copy of the value for `key`, or `None` if absent. Never touches
    /// the disk.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.cache.read().get(key).cloned()
    }

    /// Like [`get`](Self::get), deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// `true` if the key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.cache.read().contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.cache.read().len()
    }

    /// `true` when the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared.cache.read().keys().cloned().collect()
    }

    /// Owned copy of the whole mapping.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.shared.cache.read().clone()
    }

    /// Path to the backing file, made absolute at open time.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    // ---- writes ----

    /// Store `value` under `key` and rewrite the file. Returns once the file
    /// is written.
    ///
    /// Reserved keys (`__proto__`, `constructor`, `toString`, ...) are
    /// ignored without error. If the write fails the in-memory value stays
    /// updated.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if is_reserved_key(key) {
            debug!(key, "ignoring write to reserved key");
            return Ok(());
        }
        let _io = self.shared.io_lock.lock();
        self.shared
            .cache
            .write()
            .insert(key.to_owned(), value.into());
        self.shared.write_through()
    }

    /// Serialize `value` with serde and [`set`](Self::set) it.
    pub fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| Error::Serialize(e.to_string()))?;
        self.set(key, value)
    }

    /// Remove `key`, returning its value if it was present. The file is only
    /// rewritten when something was removed.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        if is_reserved_key(key) {
            return Ok(None);
        }
        let _io = self.shared.io_lock.lock();
        let prev = self.shared.cache.write().remove(key);
        if prev.is_some() {
            self.shared.write_through()?;
        }
        Ok(prev)
    }

    /// Re-read the file into memory now. A missing file reads as empty.
    /// Listeners are not notified.
    pub fn reload(&self) -> Result<()> {
        let _io = self.shared.io_lock.lock();
        self.shared.reload()
    }

    // ---- change notification ----

    /// Subscribe here to hear about changes made by other writers.
    pub fn changes(&self) -> &ChangeNotifier {
        &self.shared.notifier
    }

    /// `true` while an OS watch on the file is held.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.shared.gate.watch().is_active()
    }

    /// Unsubscribe everyone, release the watch and stop the worker thread.
    /// Dropping the store does the same.
    pub fn close(self) {
        drop(self)
    }

    fn shutdown(&mut self) {
        self.shared.gate.close();
        self.shared.notifier.unsubscribe_all();
        self.worker.take();
    }
}

impl Drop for JsonStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("path", &self.shared.path)
            .field("watch", &self.shared.gate)
            .field("changes", &self.shared.notifier)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and opens a [`JsonStore`].
///
/// ```rust,no_run
/// use json_watch_store::JsonStore;
///
/// let store = JsonStore::builder("data/settings.json")
///     .pretty(true)
///     .build()
///     .unwrap();
/// store.set("theme", "dark").unwrap();
/// ```
pub struct JsonStoreBuilder {
    path: PathBuf,
    pretty: bool,
    serializer: Option<Box<dyn Serializer>>,
}

impl JsonStoreBuilder {
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty: false,
            serializer: None,
        }
    }

    /// Write human-readable JSON with indentation (default: compact).
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Use a custom serializer. Takes precedence over [`pretty`](Self::pretty).
    pub fn serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Some(Box::new(serializer));
        self
    }

    /// Create the parent directory, load the file and return the store.
    pub fn build(self) -> Result<JsonStore> {
        let path = resolve_path(&self.path)?;
        let serializer: Box<dyn Serializer> = match self.serializer {
            Some(s) => s,
            None if self.pretty => Box::new(JsonSerializer::pretty()),
            None => Box::new(JsonSerializer::new()),
        };

        ensure_parent_dir(&path)?;
        let initial = load(&path, serializer.as_ref())?;
        debug!(path = %path.display(), entries = initial.len(), "store opened");

        let (tx, rx) = mpsc::channel();
        let gate = Arc::new(WatchGate::new(FileWatch::new(path.clone(), tx.clone())));
        let notifier = ChangeNotifier::new(gate.clone());
        let shared = Arc::new(Shared {
            path,
            serializer,
            cache: RwLock::new(initial),
            io_lock: Mutex::new(()),
            gate,
            notifier,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = ChangeWorker::start(move |g| worker_shared.on_raw_change(g), tx, rx)?;

        Ok(JsonStore {
            shared,
            worker: Some(worker),
        })
    }
}

impl std::fmt::Debug for JsonStoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStoreBuilder")
            .field("path", &self.path)
            .field("pretty", &self.pretty)
            .field("custom_serializer", &self.serializer.is_some())
            .finish()
    }
}

/// Check that `path` can name a file here and make it absolute.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("a store path is required".into()));
    }
    let display = path.display();
    if path.to_string_lossy().contains('\0') {
        return Err(Error::InvalidPath(format!("{display:?} contains a NUL byte")));
    }
    for component in path.components() {
        if let Component::Normal(part) = component {
            if has_illegal_chars(&part.to_string_lossy()) {
                return Err(Error::InvalidPath(format!(
                    "{display:?} contains characters this platform does not allow"
                )));
            }
        }
    }
    if path.file_name().is_none() {
        return Err(Error::InvalidPath(format!("{display:?} does not name a file")));
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(windows)]
fn has_illegal_chars(part: &str) -> bool {
    part.chars()
        .any(|c| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') || (c as u32) < 32)
}

#[cfg(not(windows))]
fn has_illegal_chars(_part: &str) -> bool {
    false
}
