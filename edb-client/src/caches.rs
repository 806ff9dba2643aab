//! Per-connection and process-wide caches that let the granular flow skip
//! straight to `Execute` once a command text has been seen before: a bounded
//! `query text -> (input_id, output_id, capabilities)` map per connection
//! (see [`crate::raw::Connection::cached_plan`]), and a process-wide
//! `type_id -> Typedesc` map shared by every connection, since a descriptor
//! tree for a given type id is identical everywhere. DDL capability
//! invalidates the per-connection cache, since a schema change can change
//! what a previously-parsed command compiles to.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use lru::LruCache;

use edb_protocol::common::Capabilities;
use edb_protocol::descriptors::{describes_ddl, Typedesc};
use edb_protocol::model::Uuid;

/// Default entry cap for each per-connection cache.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

fn cache_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap()
}

/// The per-connection LRU plus the bookkeeping needed to wipe it on a
/// DDL-capable command.
pub struct ConnectionCaches {
    type_id_cache: Mutex<LruCache<String, (Uuid, Uuid)>>,
    capabilities_cache: Mutex<LruCache<String, Capabilities>>,
}

impl Default for ConnectionCaches {
    fn default() -> Self {
        ConnectionCaches {
            type_id_cache: Mutex::new(LruCache::new(cache_size())),
            capabilities_cache: Mutex::new(LruCache::new(cache_size())),
        }
    }
}

impl ConnectionCaches {
    pub fn new() -> ConnectionCaches {
        ConnectionCaches::default()
    }

    /// The `(input_id, output_id)` pair cached the last time this exact
    /// query text was parsed, if any, and the command's capabilities are
    /// still known.
    pub fn type_ids(&self, query: &str) -> Option<(Uuid, Uuid)> {
        self.type_id_cache.lock().unwrap().get(query).copied()
    }

    pub fn capabilities(&self, query: &str) -> Option<Capabilities> {
        self.capabilities_cache.lock().unwrap().get(query).copied()
    }

    /// Records a freshly-parsed command, or wipes everything if it carries
    /// the DDL capability.
    pub fn store(&self, query: &str, input_id: Uuid, output_id: Uuid, capabilities: Capabilities) {
        if describes_ddl(capabilities) {
            self.clear();
            return;
        }
        self.type_id_cache.lock().unwrap().put(query.to_owned(), (input_id, output_id));
        self.capabilities_cache.lock().unwrap().put(query.to_owned(), capabilities);
    }

    pub fn clear(&self) {
        self.type_id_cache.lock().unwrap().clear();
        self.capabilities_cache.lock().unwrap().clear();
    }
}

/// The process-wide `CommandDataDescription` cache, shared by every connection since a
/// descriptor tree for a given type id is identical everywhere.
pub struct DescCache {
    inner: Mutex<LruCache<Uuid, Typedesc>>,
}

impl DescCache {
    fn new() -> DescCache {
        DescCache {
            inner: Mutex::new(LruCache::new(cache_size())),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Typedesc> {
        self.inner.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, id: Uuid, desc: Typedesc) {
        self.inner.lock().unwrap().put(id, desc);
    }
}

static DESC_CACHE: OnceLock<DescCache> = OnceLock::new();

pub fn desc_cache() -> &'static DescCache {
    DESC_CACHE.get_or_init(DescCache::new)
}
