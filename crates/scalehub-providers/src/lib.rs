//! scalehub-providers — pluggable backends around the autoscaler store.
//!
//! The scaling engine is fixed; what varies is where autoscalers are
//! declared, where metrics come from, what gets scaled, and where events go.
//! Each of those is a port trait in [`ports`]. Concrete implementations are
//! looked up by type id in a [`ProviderRegistry`] and wired together by
//! [`Backends::resolve`].
//!
//! # Data flow
//!
//! ```text
//! StorageProvider::load ──► Reconciler ──► ObjectStore ──► list/watch (engine)
//!                                             ▲                │
//!                                StatusSink ──┘                ├─► MetricSource ──► MetricsClient
//!                                                              ├─► ScaleTarget  ──► ScalingClient
//!                                                              └─► EventRecorder ─► EventCreator
//! ```

pub mod adapters;
pub mod backends;
pub mod builtin;
pub mod error;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod sync;

pub use adapters::{EventRecorder, MetricSource, ScaleTarget, TargetScale};
pub use backends::Backends;
pub use error::{ProviderError, ProviderKind, ProviderResult};
pub use ports::*;
pub use reconciler::{AutoscalerCrud, ReconcileError, ReconcileFailure, ReconcileOp, Reconciler};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use sync::StorageSync;
