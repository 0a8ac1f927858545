//! Redis-protocol store client
//!
//! Implements the KeyValueStore trait over RESP2. Change subscription uses
//! keyspace notifications: a dedicated connection issues
//! `PSUBSCRIBE __keyspace@<db>__:<pattern>` and a second one reads back the
//! current value of every key that changed.

use crate::config::schema::StoreConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::store::resp::{self, RespValue};
use crate::store::{KeyValueStore, Notification, Subscription};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Keyspace events after which the key no longer holds a value
const REMOVAL_EVENTS: &[&str] = &["del", "expired", "evicted", "rename_from"];

/// A decoded pub/sub frame, before value read-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubFrame {
    /// Subscription confirmed
    Subscribed { pattern: String },
    /// `key` was touched by `operation` (`set`, `del`, `expired`, ...)
    Message { key: String, operation: String },
    /// Subscription ended by the server
    Unsubscribed { pattern: String },
    /// Anything else
    Malformed { detail: String },
}

/// Classify a raw pub/sub frame.
///
/// `channel_prefix` is the keyspace namespace tag (`__keyspace@0__:`);
/// message channels must start with it and the remainder is the key.
pub fn classify_frame(frame: RespValue, channel_prefix: &str) -> PubSubFrame {
    let malformed = |detail: String| PubSubFrame::Malformed { detail };

    let Some(items) = frame.clone().into_array() else {
        return malformed(format!("expected array frame, got {:?}", frame));
    };
    let texts: Vec<Option<String>> = items.iter().map(RespValue::as_text).collect();
    let kind = texts.first().cloned().flatten().unwrap_or_default();

    let (channel, payload) = match (kind.as_str(), texts.as_slice()) {
        ("psubscribe" | "subscribe", [_, Some(pattern), ..]) => {
            return PubSubFrame::Subscribed {
                pattern: pattern.clone(),
            };
        }
        ("punsubscribe" | "unsubscribe", [_, Some(pattern), ..]) => {
            return PubSubFrame::Unsubscribed {
                pattern: pattern.clone(),
            };
        }
        ("pmessage", [_, _, Some(channel), Some(payload)]) => (channel, payload),
        ("message", [_, Some(channel), Some(payload)]) => (channel, payload),
        _ => return malformed(format!("unrecognised frame {:?}", items)),
    };

    match channel.strip_prefix(channel_prefix) {
        Some(key) if !key.is_empty() => PubSubFrame::Message {
            key: key.to_string(),
            operation: payload.clone(),
        },
        _ => malformed(format!("channel {} outside {}", channel, channel_prefix)),
    }
}

/// One RESP connection
struct Connection {
    addr: String,
    stream: TcpStream,
    buf: Vec<u8>,
}

impl Connection {
    /// Connect, authenticate and select the configured database
    async fn open(config: &StoreConfig) -> MirrorResult<Self> {
        let addr = config.addr();
        let timeout = Duration::from_millis(config.connect_timeout_ms);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(MirrorError::store_unavailable(addr, e)),
            Err(_) => {
                return Err(MirrorError::store_unavailable(
                    addr,
                    format!("connect timed out after {}ms", config.connect_timeout_ms),
                ))
            }
        };
        // Latency matters more than throughput for single-key reads
        let _ = stream.set_nodelay(true);

        let mut conn = Self {
            addr,
            stream,
            buf: Vec::with_capacity(4096),
        };

        if let Some(password) = &config.password {
            conn.command(&["AUTH", password.as_str()]).await?;
        }
        if config.db != 0 {
            let db = config.db.to_string();
            conn.command(&["SELECT", db.as_str()]).await?;
        }

        debug!("Connected to {}", conn.addr);
        Ok(conn)
    }

    async fn send(&mut self, args: &[&str]) -> MirrorResult<()> {
        let frame = resp::encode_command(args);
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| MirrorError::store_unavailable(self.addr.clone(), e))
    }

    async fn read_value(&mut self) -> MirrorResult<RespValue> {
        loop {
            if let Some((value, used)) = resp::parse(&self.buf)? {
                self.buf.drain(..used);
                return Ok(value);
            }

            let read = self
                .stream
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| MirrorError::store_unavailable(self.addr.clone(), e))?;
            if read == 0 {
                return Err(MirrorError::store_unavailable(
                    self.addr.clone(),
                    "connection closed by server",
                ));
            }
        }
    }

    /// Send a command and read its reply; server errors become `StoreCommand`
    async fn command(&mut self, args: &[&str]) -> MirrorResult<RespValue> {
        self.send(args).await?;
        match self.read_value().await? {
            RespValue::Error(message) => Err(MirrorError::StoreCommand {
                command: args.first().copied().unwrap_or_default().to_string(),
                message,
            }),
            value => Ok(value),
        }
    }

    async fn get(&mut self, key: &str) -> MirrorResult<Option<String>> {
        let reply = self.command(&["GET", key]).await?;
        match reply {
            nil if nil.is_nil() => Ok(None),
            other => other
                .as_text()
                .map(Some)
                .ok_or_else(|| MirrorError::StoreProtocol(format!("GET reply {:?}", other))),
        }
    }
}

/// Key/value store speaking the Redis protocol
pub struct RedisStore {
    config: StoreConfig,
    conn: Mutex<Option<Connection>>,
}

impl RedisStore {
    /// Connect to the store described by `config`
    pub async fn connect(config: StoreConfig) -> MirrorResult<Self> {
        let mut conn = Connection::open(&config).await?;

        if config.enable_keyspace_events {
            conn.command(&["CONFIG", "SET", "notify-keyspace-events", "KA"])
                .await?;
            info!("Enabled keyspace events on {}", conn.addr);
        }

        Ok(Self {
            config,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Keyspace channel prefix for the configured database
    pub fn channel_prefix(&self) -> String {
        format!("__keyspace@{}__:", self.config.db)
    }

    fn shut_down_error(&self) -> MirrorError {
        MirrorError::store_unavailable(self.config.addr(), "store has been shut down")
    }

    async fn scan_keys(
        conn: &mut Connection,
        pattern: &str,
        count: u32,
    ) -> MirrorResult<Vec<String>> {
        let count = count.max(1).to_string();
        let mut cursor = "0".to_string();
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        loop {
            let reply = conn
                .command(&["SCAN", cursor.as_str(), "MATCH", pattern, "COUNT", count.as_str()])
                .await?;
            let invalid = || MirrorError::StoreProtocol("malformed SCAN reply".to_string());

            let mut parts = reply.into_array().ok_or_else(invalid)?.into_iter();
            let next = parts.next().and_then(|v| v.as_text()).ok_or_else(invalid)?;
            let batch = parts.next().and_then(RespValue::into_array).ok_or_else(invalid)?;

            for key in batch.iter().filter_map(RespValue::as_text) {
                // SCAN may return a key more than once
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            if next == "0" {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    async fn fetch_values(
        conn: &mut Connection,
        keys: &[String],
        batch: usize,
    ) -> MirrorResult<HashMap<String, String>> {
        let mut found = HashMap::with_capacity(keys.len());

        for chunk in keys.chunks(batch.max(1)) {
            let mut args = Vec::with_capacity(chunk.len() + 1);
            args.push("MGET");
            args.extend(chunk.iter().map(String::as_str));

            let values = conn
                .command(&args)
                .await?
                .into_array()
                .ok_or_else(|| MirrorError::StoreProtocol("malformed MGET reply".to_string()))?;

            // Keys deleted between SCAN and MGET come back nil
            for (key, value) in chunk.iter().zip(values) {
                if let Some(value) = value.as_text() {
                    found.insert(key.clone(), value);
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn scan_prefix(&self, pattern: &str) -> MirrorResult<HashMap<String, String>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| self.shut_down_error())?;

        let keys = Self::scan_keys(conn, pattern, self.config.scan_count).await?;
        let found = Self::fetch_values(conn, &keys, self.config.scan_count as usize).await?;

        debug!("Scanned {} keys matching {}", found.len(), pattern);
        Ok(found)
    }

    async fn get(&self, key: &str) -> MirrorResult<Option<String>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| self.shut_down_error())?;
        conn.get(key).await
    }

    async fn subscribe(&self, pattern: &str, capacity: usize) -> MirrorResult<Subscription> {
        let prefix = self.channel_prefix();
        let channel = format!("{}{}", prefix, pattern);

        let mut listener = Connection::open(&self.config).await?;
        let mut readback = Connection::open(&self.config).await?;

        listener.send(&["PSUBSCRIBE", channel.as_str()]).await?;
        let confirmation = match listener.read_value().await? {
            RespValue::Error(message) => {
                return Err(MirrorError::StoreCommand {
                    command: "PSUBSCRIBE".to_string(),
                    message,
                })
            }
            frame => classify_frame(frame, &prefix),
        };
        let confirmed = match confirmation {
            PubSubFrame::Subscribed { pattern } => pattern,
            other => {
                return Err(MirrorError::StoreProtocol(format!(
                    "expected psubscribe confirmation, got {:?}",
                    other
                )))
            }
        };
        info!("Subscribed to {}", confirmed);

        let (tx, rx) = mpsc::channel(capacity.max(1));
        if tx
            .send(Notification::Subscribed { pattern: confirmed })
            .await
            .is_err()
        {
            return Err(MirrorError::User("subscription dropped during setup".to_string()));
        }

        let pump = tokio::spawn(async move {
            loop {
                let frame = match listener.read_value().await {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Subscription on {} ended: {}", channel, e);
                        break;
                    }
                };

                let (notification, last) = match classify_frame(frame, &prefix) {
                    PubSubFrame::Message { key, operation } => {
                        match resolve(&mut readback, &key, &operation).await {
                            Ok(notification) => (notification, false),
                            Err(e) if e.is_connection_error() => {
                                warn!("Read-back failed, ending subscription: {}", e);
                                break;
                            }
                            // e.g. WRONGTYPE for a hash or list under the pattern
                            Err(e) => (
                                Notification::Malformed {
                                    detail: format!("read-back of {} failed: {}", key, e),
                                },
                                false,
                            ),
                        }
                    }
                    PubSubFrame::Subscribed { pattern } => {
                        (Notification::Subscribed { pattern }, false)
                    }
                    PubSubFrame::Unsubscribed { pattern } => {
                        (Notification::Unsubscribed { pattern }, true)
                    }
                    PubSubFrame::Malformed { detail } => (Notification::Malformed { detail }, false),
                };

                if tx.send(notification).await.is_err() || last {
                    break;
                }
            }
            debug!("Subscription pump for {} stopped", channel);
        });

        Ok(Subscription::new(pattern, rx, Some(pump)))
    }

    async fn shutdown(&self) -> MirrorResult<()> {
        if let Some(mut conn) = self.conn.lock().await.take() {
            // Best effort; the socket is dropped either way
            let _ = conn.command(&["QUIT"]).await;
            debug!("Closed connection to {}", conn.addr);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Turn a keyspace event into a notification carrying the current value
async fn resolve(
    readback: &mut Connection,
    key: &str,
    operation: &str,
) -> MirrorResult<Notification> {
    let key = key.to_string();
    if REMOVAL_EVENTS.contains(&operation) {
        return Ok(Notification::Removed { key });
    }

    Ok(match readback.get(&key).await? {
        Some(value) => Notification::Message { key, value },
        None => Notification::Removed { key },
    })
}
