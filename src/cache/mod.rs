//! Read-through cache for booking queries.
//!
//! `CacheStore` is the raw text key-value contract a backend implements;
//! `Cache` is the typed facade the engine talks to. Values are JSON text.
//! Reads never fail: a missing key, an unreachable backend and an
//! undecodable value all come back as absent.

mod keys;
mod memory;

pub use keys::{BookingKey, ALL_BOOKINGS_PATTERN, BOOKINGS_PREFIX, booking_detail_key};
pub use memory::InMemoryCache;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::observability::{CACHE_LOOKUPS_TOTAL, CACHE_INVALIDATED_KEYS_TOTAL};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache value encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Returns whether the key was present.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key matching `pattern` (`*` and `?` wildcards) in one
    /// logical operation. Returns how many keys were removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<usize, CacheError>;
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCache::new()))
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let text = serde_json::to_string(value)?;
        self.store.set(key, text).await
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.store.get(key).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                metrics::counter!(CACHE_LOOKUPS_TOTAL, "result" => "miss").increment(1);
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                metrics::counter!(CACHE_LOOKUPS_TOTAL, "result" => "error").increment(1);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => {
                metrics::counter!(CACHE_LOOKUPS_TOTAL, "result" => "hit").increment(1);
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "undecodable cache entry, treating as miss");
                metrics::counter!(CACHE_LOOKUPS_TOTAL, "result" => "error").increment(1);
                None
            }
        }
    }

    /// Like `get`, but absence is an empty list.
    pub async fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.get::<Vec<T>>(key).await.unwrap_or_default()
    }

    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(key).await
    }

    pub async fn delete_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let removed = self.store.delete_by_pattern(pattern).await?;
        metrics::counter!(CACHE_INVALIDATED_KEYS_TOTAL).increment(removed as u64);
        Ok(removed)
    }
}

/// Redis `KEYS`-style glob: `*` matches any run (including empty), `?` one
/// character, `\` escapes the next character.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0usize, 0usize);
    // Position of the last `*` seen and the key index it is currently covering.
    let mut backtrack: Option<(usize, usize)> = None;

    while ki < k.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ki));
                pi += 1;
                continue;
            }
            Some('?') => {
                pi += 1;
                ki += 1;
                continue;
            }
            Some('\\') if pi + 1 < p.len() && p[pi + 1] == k[ki] => {
                pi += 2;
                ki += 1;
                continue;
            }
            Some(&c) if c != '\\' && c == k[ki] => {
                pi += 1;
                ki += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star, covered)) => {
                pi = star + 1;
                ki = covered + 1;
                backtrack = Some((star, covered + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}
