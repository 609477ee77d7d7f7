use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::request::ValueCandidate;

const KEY_PREFIX: &str = "pf-autocomplete";

/// Keyed store with per-entry expiry. Shared across concurrent requests.
pub trait ValueCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<ValueCandidate>>;
    fn set(&self, key: &CacheKey, values: Vec<ValueCandidate>, ttl: Duration);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Composite of every lookup input. Each part is length-prefixed so
    /// separators inside names cannot collide; trailing whitespace in the
    /// substring is dropped.
    pub fn new(
        kind: &str,
        fields: &[&str],
        substring: &str,
        base: Option<(&[&str], &str)>,
        limit: usize,
    ) -> Self {
        let mut composite = String::new();
        push_part(&mut composite, kind);
        for field in fields {
            push_part(&mut composite, field);
        }
        push_part(&mut composite, substring.trim_end());
        if let Some((base_fields, base_value)) = base {
            for field in base_fields {
                push_part(&mut composite, field);
            }
            push_part(&mut composite, base_value);
        }
        push_part(&mut composite, &limit.to_string());

        let digest = Sha256::digest(composite.as_bytes());
        let hex = digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        Self(format!("{KEY_PREFIX}:{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn push_part(composite: &mut String, part: &str) {
    composite.push_str(&part.len().to_string());
    composite.push(':');
    composite.push_str(part);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    values: Vec<ValueCandidate>,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-process cache. Entries are replaced whole; last write wins. A zero TTL,
/// or one too large to represent, stores the entry without expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValueCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<ValueCandidate>> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            entries.remove(key);
            return None;
        }
        Some(entry.values.clone())
    }

    fn set(&self, key: &CacheKey, values: Vec<ValueCandidate>, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        let expires_at = if ttl.is_zero() {
            None
        } else {
            now.checked_add(ttl)
        };
        entries.insert(key.clone(), CacheEntry { values, expires_at });
    }
}

/// Which cache a value source consults, and for how long it stores results.
#[derive(Clone, Copy)]
pub struct CachePolicy<'a> {
    pub cache: Option<&'a dyn ValueCache>,
    pub ttl: Duration,
}

impl<'a> CachePolicy<'a> {
    pub fn disabled() -> Self {
        Self {
            cache: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn lookup<F>(&self, key: &CacheKey, compute: F) -> Result<Vec<ValueCandidate>>
    where
        F: FnOnce() -> Result<Vec<ValueCandidate>>,
    {
        cached_lookup(self.cache, key, self.ttl, compute)
    }
}

/// Serve `key` from `cache` when it holds a non-empty list, otherwise run
/// `compute` and store a non-empty result. Empty results are never stored.
pub fn cached_lookup<F>(
    cache: Option<&dyn ValueCache>,
    key: &CacheKey,
    ttl: Duration,
    compute: F,
) -> Result<Vec<ValueCandidate>>
where
    F: FnOnce() -> Result<Vec<ValueCandidate>>,
{
    let Some(cache) = cache else {
        return compute();
    };
    if let Some(values) = cache.get(key)
        && !values.is_empty()
    {
        debug!(key = key.as_str(), count = values.len(), "autocomplete cache hit");
        return Ok(values);
    }
    debug!(key = key.as_str(), "autocomplete cache miss");
    let values = compute()?;
    if !values.is_empty() {
        cache.set(key, values.clone(), ttl);
    }
    Ok(values)
}
