//! Read-only access for consumers
//!
//! `EnvReader` is what the animation loop holds. Reads take a short read
//! lock and never touch the store.

use crate::mirror::key::EnvKey;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

pub(crate) type Entries = Arc<RwLock<HashMap<EnvKey, String>>>;

/// Set while a listener is applying changes to the cache
pub(crate) type LiveFlag = Arc<AtomicBool>;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+\.?[0-9]*$").expect("valid number regex"));

/// Parse a mirrored value as a number.
///
/// Accepts an optional `-`, digits, and an optional fractional part
/// (`3.`, `3.14`). Anything else is `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    if !NUMBER.is_match(value) {
        return None;
    }
    value.parse().ok()
}

/// Cloneable read handle onto an environment's cache
#[derive(Clone)]
pub struct EnvReader {
    entries: Entries,
    live: LiveFlag,
}

impl EnvReader {
    pub(crate) fn new(entries: Entries, live: LiveFlag) -> Self {
        Self { entries, live }
    }

    /// Whether changes in the store are still reaching this cache.
    ///
    /// `false` once the mirror stops or its change feed closes; values
    /// read after that may be stale.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Latest value for `key`, if mirrored
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Latest value for `key`, or `default`
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Latest value for `key` parsed as a number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.entries.read().get(key).and_then(|v| parse_number(v))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for EnvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvReader")
            .field("entries", &self.len())
            .field("live", &self.is_live())
            .finish()
    }
}
