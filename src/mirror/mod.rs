//! Environment mirror
//!
//! Keeps a local, continuously updated copy of the `env` namespace of a
//! key/value store and serves synchronous reads from it.
//!
//! # Admission
//!
//! Only keys of the form `env[.sub...]/name` are cached. Anything else coming
//! from the bulk load or the change feed is logged and dropped.
//!
//! # Consistency
//!
//! | Path | Blocks | Ordering |
//! |------|--------|----------|
//! | bulk load | caller of `start` | before any change is applied |
//! | change feed | listener task | store delivery order, last write wins |
//! | reads | never | sees old or new value per key |

mod environment;
mod key;
mod reader;
pub mod validator;

pub use environment::Environment;
pub use key::EnvKey;
pub use reader::{parse_number, EnvReader};
pub use validator::is_valid_env_key;
