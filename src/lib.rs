//! envmirror - live mirror of a key/value store's env namespace
//!
//! Bulk-loads validated `env` keys from a key/value store, keeps them current
//! through change notifications, and serves non-blocking reads to consumers
//! such as the bundled animation sketch.

pub mod cli;
pub mod config;
pub mod error;
pub mod mirror;
pub mod sketch;
pub mod store;
pub mod system;

pub use error::{MirrorError, MirrorResult};
pub use mirror::{EnvReader, Environment};
pub use store::KeyValueStore;
pub use system::System;
