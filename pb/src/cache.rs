//! SessionCache - TTL-bounded conversational context
//!
//! Maps a (conversation, thread) key to the last plan and result produced in
//! that thread. Entries are superseded on every write and evicted lazily:
//! an expired entry is removed by the `get` that observes it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::{Plan, QueryResult};

/// Default time-to-live for cached results
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Thread component of a session key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadKey {
    /// An explicit thread identity
    Thread(String),
    /// Per-conversation slot holding the most recent result in any thread
    LastResult,
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thread(id) => write!(f, "{}", id),
            Self::LastResult => write!(f, "__last__"),
        }
    }
}

/// Identifies a cacheable conversational context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub conversation_id: String,
    pub thread: ThreadKey,
}

impl SessionKey {
    pub fn thread(conversation_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            thread: ThreadKey::Thread(thread_id.into()),
        }
    }

    pub fn last_result(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            thread: ThreadKey::LastResult,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.conversation_id, self.thread)
    }
}

/// What gets remembered about an executed plan
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult {
    pub plan: Plan,
    pub result: QueryResult,
    pub statement: String,
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedResult,
    written_at: Instant,
}

/// In-memory session store shared across concurrent requests
///
/// A single mutex guards the map; writers to the same key follow
/// last-writer-wins semantics.
#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    entries: Mutex<HashMap<SessionKey, CacheEntry>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        debug!(?ttl, "SessionCache::new: called");
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a value, replacing whatever was at this key
    pub fn set(&self, key: SessionKey, value: CachedResult) {
        self.set_at(key, value, Instant::now());
    }

    /// Look up a live value; expired entries are deleted and reported absent
    pub fn get(&self, key: &SessionKey) -> Option<CachedResult> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn set_at(&self, key: SessionKey, value: CachedResult, now: Instant) {
        debug!(%key, "SessionCache::set: called");
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                value,
                written_at: now,
            },
        );
    }

    pub(crate) fn get_at(&self, key: &SessionKey, now: Instant) -> Option<CachedResult> {
        debug!(%key, "SessionCache::get: called");
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let entry = entries.get(key)?;
        let age = now.saturating_duration_since(entry.written_at);
        if age > self.ttl {
            debug!(%key, ?age, "SessionCache::get: entry expired, evicting");
            entries.remove(key);
            return None;
        }

        debug!(%key, "SessionCache::get: hit");
        Some(entry.value.clone())
    }

    /// Number of stored entries, live or not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
