//! Interned key token

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Fully-qualified key of a mirrored entry (`env/color`)
///
/// Cheap to clone; compares and hashes like the underlying string so maps
/// keyed by `EnvKey` can be queried with `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvKey(Arc<str>);

impl EnvKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EnvKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl Borrow<str> for EnvKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
