//! Configuration schema for envmirror
//!
//! Configuration is stored at `~/.config/envmirror/config.toml`

use crate::mirror::is_valid_env_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Key/value store connection
    pub store: StoreConfig,

    /// Mirror settings
    pub mirror: MirrorConfig,

    /// Animation consumer settings
    pub sketch: SketchConfig,
}

impl Config {
    /// Check values that parse but cannot work, returning the first problem
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got {:?}",
                self.general.log_format
            ));
        }
        if self.store.backend == "redis" && self.store.host.is_empty() {
            return Err("store.host must not be empty".to_string());
        }
        if self.store.scan_count == 0 {
            return Err("store.scan_count must be at least 1".to_string());
        }
        if self.mirror.pattern.is_empty() {
            return Err("mirror.pattern must not be empty".to_string());
        }
        if self.mirror.channel_capacity == 0 {
            return Err("mirror.channel_capacity must be at least 1".to_string());
        }
        if !is_valid_env_key(&self.sketch.color_key) {
            return Err(format!(
                "sketch.color_key {:?} is not an env key and would never be mirrored",
                self.sketch.color_key
            ));
        }
        if self.sketch.fps == 0 || self.sketch.report_every == 0 {
            return Err("sketch.fps and sketch.report_every must be at least 1".to_string());
        }
        if !self.sketch.angle_step.is_finite() || !self.sketch.radius.is_finite() {
            return Err("sketch.angle_step and sketch.radius must be finite".to_string());
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Key/value store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend: "redis" or "memory"
    pub backend: String,

    /// Store host
    pub host: String,

    /// Store port
    pub port: u16,

    /// Logical database index
    pub db: u32,

    /// Password sent with AUTH (optional)
    pub password: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Ask the server to emit keyspace events on connect
    pub enable_keyspace_events: bool,

    /// COUNT hint for each SCAN round trip
    pub scan_count: u32,

    /// Initial contents for the memory backend
    pub seed: BTreeMap<String, String>,
}

impl StoreConfig {
    /// `host:port` address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
            connect_timeout_ms: 2000,
            enable_keyspace_events: false,
            scan_count: 100,
            seed: BTreeMap::new(),
        }
    }
}

/// Mirror settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Glob pattern of keys to mirror
    pub pattern: String,

    /// Notifications buffered between the store and the cache
    pub channel_capacity: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            pattern: "env*".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// Animation consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Key holding the color override
    pub color_key: String,

    /// Ticks per second
    pub fps: u32,

    /// Degrees added to the angle each tick
    pub angle_step: f64,

    /// Orbit radius of the circle
    pub radius: f64,

    /// Print every Nth frame (1 = every frame)
    pub report_every: u64,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            color_key: "env/color".to_string(),
            fps: 30,
            angle_step: 2.0,
            radius: 100.0,
            report_every: 1,
        }
    }
}
