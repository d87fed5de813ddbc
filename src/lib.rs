//! JSON file-backed key-value store that stays coherent across instances.
//!
//! Every [`JsonStore`] keeps the whole file in memory and serves reads from
//! there. Writes rewrite the file. Subscribe on [`JsonStore::changes`] and the
//! store watches the file, reloading and telling you whenever another
//! instance (in this process or another one) wrote to it. Your own writes
//! never come back to you as change events.
//!
//! ```rust,no_run
//! use json_watch_store::JsonStore;
//!
//! let a = JsonStore::open("db.json").unwrap();
//! let b = JsonStore::open("db.json").unwrap();
//!
//! let _sub = b.changes().subscribe(|| println!("db.json changed")).unwrap();
//! a.set("hello", "world").unwrap();
//! // shortly after, b reloads and prints
//! ```
//!
//! There is no locking between writers. Whoever writes last wins.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod gate;
pub mod notifier;
pub mod persist;
pub mod serializer;
pub mod store;
pub mod watch;
pub mod worker;

pub use error::{Error, Result};
pub use notifier::{ChangeNotifier, Subscription};
pub use serializer::{JsonSerializer, Serializer};
pub use store::{JsonStore, JsonStoreBuilder};
pub use watch::WatchMode;

/// Re-exported so callers can build values without naming serde_json.
pub use serde_json::{json, Map, Value};
