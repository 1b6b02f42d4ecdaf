//! Registries for resource types, roles, and obligations.
//!
//! # Purpose
//! Each registry wraps the store with a read-through cache keyed by ID and owns
//! the authoring validation for its records. The decision engine reads through
//! the registries; writes made through a registry invalidate its cache entry.
//!
//! # Key invariants
//! - Cached entries (including "does not exist") live at most `ttl`.
//! - Store errors are never cached.
//!
//! # Concurrency model
//! Cache entries sit in a `DashMap` so lookups from concurrent decisions do not
//! contend on one lock. No map guard is held across an `await`.
mod obligations;
mod resource_types;
mod roles;

pub use obligations::{ObligationRegistry, validate_value};
pub use resource_types::ResourceTypeRegistry;
pub use roles::RoleRegistry;

use crate::store::StoreResult;
use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

struct CachedEntry<V> {
    value: Option<V>,
    expires_at: Instant,
}

pub(crate) struct TtlCache<V> {
    ttl: Duration,
    entries: DashMap<String, CachedEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub(crate) async fn get_or_load<F, Fut>(&self, id: &str, load: F) -> StoreResult<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<Option<V>>>,
    {
        if let Some(entry) = self.entries.get(id)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.value.clone());
        }
        let value = load().await?;
        self.entries.insert(
            id.to_string(),
            CachedEntry {
                value: value.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(value)
    }

    pub(crate) fn invalidate(&self, id: &str) {
        self.entries.remove(id);
    }
}
