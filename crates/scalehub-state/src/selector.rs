//! Identity-carrying key=value selectors.
//!
//! The scaling engine's metric and scale interfaces only accept a generic
//! label selector. Adapters on both sides of that boundary use a
//! [`SelectorCodec`] to carry a single value (an autoscaler name, a replica
//! count) through it. Selectors that reach [`SelectorCodec::decode`] were
//! produced by our own adapters, so a malformed one is a wiring defect and
//! panics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// A set of `key=value` match labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = StateError;

    /// Parse the `k1=v1,k2=v2` form. An empty string is the empty selector.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selector = Selector::new();
        if s.is_empty() {
            return Ok(selector);
        }
        for expr in s.split(',') {
            match expr.split_once('=') {
                Some((k, v)) if !k.is_empty() && !v.contains('=') => {
                    selector.0.insert(k.to_string(), v.to_string());
                }
                _ => {
                    return Err(StateError::Invalid(format!(
                        "invalid selector expression: {expr}"
                    )));
                }
            }
        }
        Ok(selector)
    }
}

/// Encodes a single value under a fixed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorCodec {
    key: &'static str,
}

/// Carries the owning autoscaler's name through metric selectors.
pub const AUTOSCALER_SELECTOR: SelectorCodec = SelectorCodec::new("autoscaler");

/// Carries a replica count through the scale status selector.
pub const REPLICAS_SELECTOR: SelectorCodec = SelectorCodec::new("replicas");

impl SelectorCodec {
    pub const fn new(key: &'static str) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn encode(&self, value: &str) -> Selector {
        Selector::new().with(self.key, value)
    }

    /// Recover the value encoded by [`SelectorCodec::encode`].
    ///
    /// # Panics
    ///
    /// If the selector is not exactly one pair under this codec's key.
    pub fn decode(&self, selector: &Selector) -> String {
        if selector.len() != 1 {
            panic!("unexpected selector format: {selector}");
        }
        match selector.get(self.key) {
            Some(value) => value.to_string(),
            None => panic!("unexpected selector label, expected {}: {selector}", self.key),
        }
    }
}

/// Encode the status selector the engine attaches to a scale reply.
pub fn encode_replicas(replicas: u32) -> Selector {
    REPLICAS_SELECTOR.encode(&replicas.to_string())
}

/// # Panics
///
/// If the selector was not produced by [`encode_replicas`].
pub fn decode_replicas(selector: &Selector) -> u32 {
    let value = REPLICAS_SELECTOR.decode(selector);
    match value.parse() {
        Ok(replicas) => replicas,
        Err(_) => panic!("unexpected replicas selector value: {selector}"),
    }
}
