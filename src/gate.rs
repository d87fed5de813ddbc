//! Watch lifecycle as an explicit state machine.
//!
//! The watch should run exactly when somebody listens for changes *and*
//! nothing in this instance is currently touching the file:
//!
//! ```text
//! Stopped --(first listener)------------------> Active
//! Active  --(last listener gone)--------------> Stopped
//! Active  --(hold: own write / reload begins)-> Stopped
//! Stopped --(last hold released, listening)---> Active
//! ```
//!
//! Holds are counted, so a write and a reload overlapping on one instance
//! keep the watch stopped until both are done, and it is restarted once.

use crate::error::Result;
use crate::watch::Watch;
use parking_lot::Mutex;
use tracing::warn;

/// Inputs that decide whether the watch runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    /// At least one change listener is registered.
    pub wanted: bool,
    /// Writes/reloads in progress that need the watch paused.
    pub holds: usize,
    /// The owning store was closed; the watch never restarts.
    pub closed: bool,
}

impl GateState {
    /// Whether the watch should be active in this state.
    pub fn should_watch(&self) -> bool {
        self.wanted && self.holds == 0 && !self.closed
    }
}

/// Drives a [`Watch`] from [`GateState`] transitions. Every transition runs
/// under one lock, so the watch always reflects the latest state.
pub struct WatchGate<W> {
    watch: W,
    state: Mutex<GateState>,
}

impl<W: Watch> WatchGate<W> {
    /// Wrap `watch`, initially stopped.
    pub fn new(watch: W) -> Self {
        Self {
            watch,
            state: Mutex::new(GateState::default()),
        }
    }

    /// The underlying watch.
    pub fn watch(&self) -> &W {
        &self.watch
    }

    /// Current state snapshot.
    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    fn settle(&self, state: &GateState) -> Result<()> {
        if state.should_watch() {
            self.watch.start()
        } else {
            self.watch.stop();
            Ok(())
        }
    }

    /// First listener arrived. On failure the gate goes back to unwanted so
    /// the caller can drop the listener.
    pub fn want(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.wanted = true;
        if let Err(e) = self.settle(&state) {
            state.wanted = false;
            self.watch.stop();
            return Err(e);
        }
        Ok(())
    }

    /// Last listener left.
    pub fn unwant(&self) {
        let mut state = self.state.lock();
        state.wanted = false;
        self.watch.stop();
    }

    /// Pause the watch until the returned guard is released.
    pub fn hold(&self) -> Hold<'_, W> {
        let mut state = self.state.lock();
        state.holds += 1;
        self.watch.stop();
        Hold {
            gate: self,
            released: false,
        }
    }

    /// Pause the watch only if `generation` is the active watch's. Used by
    /// the worker to turn the first raw event of a burst into a reload while
    /// the rest of the burst is ignored.
    pub fn claim(&self, generation: u64) -> Option<Hold<'_, W>> {
        let mut state = self.state.lock();
        if state.closed || !self.watch.is_current(generation) {
            return None;
        }
        state.holds += 1;
        self.watch.stop();
        Some(Hold {
            gate: self,
            released: false,
        })
    }

    /// Stop for good. Later transitions never start the watch again.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.watch.stop();
    }

    fn release(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.holds = state.holds.saturating_sub(1);
        self.settle(&state)
    }
}

impl<W> std::fmt::Debug for WatchGate<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGate")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Keeps the watch paused while alive. Releasing the last hold restarts the
/// watch if listeners remain, whether or not the guarded work succeeded.
#[must_use = "dropping the hold resumes the watch immediately"]
pub struct Hold<'a, W: Watch> {
    gate: &'a WatchGate<W>,
    released: bool,
}

impl<W: Watch> Hold<'_, W> {
    /// Release the hold and report whether the watch could be resumed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.gate.release()
    }
}

impl<W: Watch> Drop for Hold<'_, W> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.gate.release() {
                warn!("failed to resume watch: {e}");
            }
        }
    }
}
