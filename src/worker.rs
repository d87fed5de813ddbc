//! Background thread that turns raw change signals into reloads.
//!
//! The `notify` callback only forwards a [`Signal`]; the reload and the
//! listener calls happen here, one signal at a time. Joins the thread on drop
//! so nothing leaks.

use std::sync::mpsc::{Receiver, Sender};
use std::thread;

/// Messages for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A watcher of the given generation saw the file change.
    Changed(u64),
    /// Exit the loop.
    Shutdown,
}

/// Owns the worker thread. The store keeps one per instance.
pub struct ChangeWorker {
    tx: Sender<Signal>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl ChangeWorker {
    /// Spawn the worker. `tx` must feed `rx`; it's kept to deliver
    /// [`Signal::Shutdown`] on drop.
    pub fn start<F>(on_change: F, tx: Sender<Signal>, rx: Receiver<Signal>) -> std::io::Result<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let join_handle = thread::Builder::new()
            .name("json-watch-store".into())
            .spawn(move || {
                while let Ok(signal) = rx.recv() {
                    match signal {
                        Signal::Changed(generation) => on_change(generation),
                        Signal::Shutdown => break,
                    }
                }
            })?;

        Ok(Self {
            tx,
            join_handle: Some(join_handle),
        })
    }
}

impl Drop for ChangeWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(Signal::Shutdown);
        if let Some(h) = self.join_handle.take() {
            // A listener releasing the last store handle runs on this very
            // thread; it exits on its own once the callback returns.
            if h.thread().id() != thread::current().id() {
                let _ = h.join();
            }
        }
    }
}

impl std::fmt::Debug for ChangeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWorker")
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn handles_signals_in_order_then_joins() {
        let (tx, rx) = mpsc::channel();
        let last = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&last);
        let worker = ChangeWorker::start(
            move |g| {
                assert!(g > seen.load(Ordering::SeqCst));
                seen.store(g, Ordering::SeqCst);
            },
            tx.clone(),
            rx,
        )
        .unwrap();

        for g in 1..=5 {
            tx.send(Signal::Changed(g)).unwrap();
        }
        drop(worker);
        assert_eq!(last.load(Ordering::SeqCst), 5);
    }
}
