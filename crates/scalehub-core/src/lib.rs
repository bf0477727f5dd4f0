//! scalehub-core — configuration types shared by every scalehub crate.
//!
//! Backends are selected by a [`TypedConfig`]: a stable type identifier plus
//! an opaque payload that only the matching provider knows how to decode.
//! [`ControllerConfig`] is the daemon document that names one such config per
//! seam along with the tuning scalars consumed by the scaling engine.

pub mod config;
pub mod typed;

pub use config::{ConfigError, ControllerConfig, StoreTuning, WatchOverflow};
pub use typed::TypedConfig;
