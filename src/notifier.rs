//! Subscription surface for the "changed" event.
//!
//! The listener count drives the watch: the first [`subscribe`] activates it,
//! the last unsubscribe deactivates it.
//!
//! [`subscribe`]: ChangeNotifier::subscribe

use crate::error::Result;
use crate::gate::WatchGate;
use crate::watch::Watch;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Hook called on the 0 -> 1 and 1 -> 0 listener transitions.
pub trait Activation: Send + Sync {
    /// First listener is being added. An error refuses the subscription.
    fn activate(&self) -> Result<()>;

    /// Last listener was removed.
    fn deactivate(&self);
}

impl<W: Watch> Activation for WatchGate<W> {
    fn activate(&self) -> Result<()> {
        self.want()
    }

    fn deactivate(&self) {
        self.unwant()
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

struct NotifierInner {
    registry: Mutex<Registry>,
    activation: Arc<dyn Activation>,
}

impl NotifierInner {
    fn remove(&self, id: u64) {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _)| *lid != id);
        if before > 0 && registry.listeners.is_empty() {
            self.activation.deactivate();
        }
    }
}

/// Emits "changed" to registered listeners when another writer modified the
/// file. Never fires for the owning store's own writes.
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    /// New notifier with no listeners, wired to `activation`.
    pub fn new(activation: Arc<dyn Activation>) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                registry: Mutex::new(Registry::default()),
                activation,
            }),
        }
    }

    /// Register `listener`. It runs on the store's worker thread, after the
    /// cache already holds the new file content.
    ///
    /// Fails when this is the first listener and the file watch can't be set
    /// up; the listener is not registered in that case.
    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.inner.registry.lock();
        if registry.listeners.is_empty() {
            self.inner.activation.activate()?;
        }
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Ok(Subscription {
            id,
            notifier: Arc::downgrade(&self.inner),
            detached: false,
        })
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.lock().listeners.len()
    }

    /// Drop every listener, detached ones included.
    pub fn unsubscribe_all(&self) {
        let mut registry = self.inner.registry.lock();
        if !registry.listeners.is_empty() {
            registry.listeners.clear();
            self.inner.activation.deactivate();
        }
    }

    /// Call every listener registered right now, in registration order.
    /// Listeners added while this runs are not called.
    pub(crate) fn emit(&self) {
        let snapshot: Vec<Listener> = self
            .inner
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle for one registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    notifier: Weak<NotifierInner>,
    detached: bool,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self)
    }

    /// Keep the listener registered for the notifier's lifetime without
    /// holding on to the handle.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(inner) = self.notifier.upgrade() {
            inner.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
