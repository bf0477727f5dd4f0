//! Providers that ship with scalehub.
//!
//! - `inline` storage: autoscalers declared in the provider's own config.
//! - `log` events: engine events written to the log.
//! - `sim` metrics and scaling: simulated load that reacts to scale changes.

pub mod inline;
pub mod log_events;
pub mod sim;
