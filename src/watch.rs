//! OS change notification for a single file.
//!
//! [`FileWatch`] wraps a `notify` watcher. It prefers watching the file
//! itself; when the file doesn't exist yet it watches the containing
//! directory instead and keeps only events naming the target file.
//!
//! Every activation gets a fresh generation number. Raw events are forwarded
//! to the store's worker tagged with the generation of the watcher that saw
//! them, which lets the worker drop everything a stopped watcher still had in
//! flight.

use crate::error::Result;
use crate::worker::Signal;
use notify::event::{AccessKind, AccessMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, trace, warn};

/// What the OS watch is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// The target file itself.
    File,
    /// The parent directory, filtered down to the target's file name.
    Directory,
}

/// Start/stop control over a watch resource. [`FileWatch`] is the real one;
/// the lifecycle gate only talks to this trait.
pub trait Watch: Send + Sync {
    /// Acquire the watch. No-op when already active.
    fn start(&self) -> Result<()>;

    /// Release the watch. No-op when not active.
    fn stop(&self);

    /// `true` while a watch resource is held.
    fn is_active(&self) -> bool;

    /// `true` if `generation` belongs to the watch that is active right now.
    fn is_current(&self, generation: u64) -> bool;
}

struct ActiveWatch {
    // Dropping the watcher releases the OS handle.
    _watcher: RecommendedWatcher,
    mode: WatchMode,
    generation: u64,
}

struct WatchState {
    signals: Sender<Signal>,
    generation: u64,
    active: Option<ActiveWatch>,
}

/// Watches one file path and reports content changes to the worker.
pub struct FileWatch {
    target: PathBuf,
    state: Mutex<WatchState>,
}

impl FileWatch {
    /// Create an inactive watch for `target`. Change signals go to `signals`.
    pub fn new(target: PathBuf, signals: Sender<Signal>) -> Self {
        Self {
            target,
            state: Mutex::new(WatchState {
                signals,
                generation: 0,
                active: None,
            }),
        }
    }

    /// Mode of the active watch, or `None` when stopped.
    pub fn mode(&self) -> Option<WatchMode> {
        self.state.lock().active.as_ref().map(|a| a.mode)
    }

    fn attach(
        &self,
        mode: WatchMode,
        generation: u64,
        signals: Sender<Signal>,
    ) -> notify::Result<ActiveWatch> {
        let target = self.target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if is_relevant(&event, mode, &target) {
                        trace!(path = %target.display(), generation, kind = ?event.kind, "raw change");
                        let _ = signals.send(Signal::Changed(generation));
                    }
                }
                Err(e) => warn!(path = %target.display(), "watcher error: {e}"),
            }
        })?;
        let watched = match mode {
            WatchMode::File => self.target.clone(),
            WatchMode::Directory => watch_dir(&self.target),
        };
        watcher
            .watch(&watched, RecursiveMode::NonRecursive)
            .map_err(|e| {
                if e.paths.is_empty() {
                    e.add_path(watched.clone())
                } else {
                    e
                }
            })?;
        Ok(ActiveWatch {
            _watcher: watcher,
            mode,
            generation,
        })
    }
}

impl Watch for FileWatch {
    fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.active.is_some() {
            return Ok(());
        }
        state.generation += 1;
        let generation = state.generation;
        let signals = state.signals.clone();

        let active = match self.attach(WatchMode::File, generation, signals.clone()) {
            Ok(active) => active,
            Err(e) if is_not_found(&e) => self.attach(WatchMode::Directory, generation, signals)?,
            Err(e) => return Err(e.into()),
        };
        debug!(path = %self.target.display(), mode = ?active.mode, generation, "watch started");
        state.active = Some(active);
        Ok(())
    }

    fn stop(&self) {
        let released = self.state.lock().active.take();
        if let Some(active) = released {
            debug!(path = %self.target.display(), generation = active.generation, "watch stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.state.lock().active.is_some()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch")
            .field("target", &self.target)
            .field("mode", &self.mode())
            .finish()
    }
}

fn watch_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_not_found(err: &notify::Error) -> bool {
    match &err.kind {
        notify::ErrorKind::PathNotFound => true,
        notify::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

// Reads and opens say nothing about content; a close after writing does.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

fn is_relevant(event: &notify::Event, mode: WatchMode, target: &Path) -> bool {
    if !is_content_change(&event.kind) {
        return false;
    }
    match mode {
        WatchMode::File => true,
        WatchMode::Directory => event
            .paths
            .iter()
            .any(|p| p == target || (p.file_name().is_some() && p.file_name() == target.file_name())),
    }
}
