//! scalehub-state — in-memory autoscaler store for scalehub.
//!
//! Holds every declared autoscaler, projects each into the view the scaling
//! engine consumes, and notifies watchers of every change in a single total
//! order.
//!
//! # Architecture
//!
//! [`ObjectStore`] keeps records in a per-namespace map behind one
//! `RwLock`. Mutations stamp a store-wide version, re-derive the record's
//! [`AutoscalerView`], and enqueue a [`WatchEvent`] for each matching
//! [`Watch`] before the lock is released. Watch queues are bounded; what
//! happens to a subscriber that falls behind is set by
//! [`scalehub_core::WatchOverflow`].
//!
//! The engine writes status back through a namespace-scoped [`StatusSink`].
//!
//! The store is `Clone` + `Send` + `Sync` (backed by an `Arc`) and can be
//! shared across async tasks and threads.

pub mod error;
pub mod selector;
pub mod status;
pub mod store;
pub mod types;
pub mod view;
pub mod watch;

pub use error::{StateError, StateResult};
pub use selector::{
    AUTOSCALER_SELECTOR, REPLICAS_SELECTOR, Selector, SelectorCodec, decode_replicas,
    encode_replicas,
};
pub use status::{StatusHandler, StatusSink};
pub use store::{ObjectStore, ObjectStoreBuilder};
pub use types::*;
pub use view::*;
pub use watch::{EventKind, Watch, WatchEvent};
