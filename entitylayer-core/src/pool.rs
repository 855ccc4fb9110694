//! The identity pool: identity map plus dirty-check cache.
//!
//! The pool guarantees that at most one live [`Entity`] instance exists
//! per (entity type, identity) at any time, and records the content hash
//! of the last persisted document per identity so unchanged entities are
//! never rewritten.
//!
//! Entries hold weak, non-owning handles: the pool never extends an
//! entity's lifetime, and dead entries are reclaimed lazily when a lookup
//! misses them. All access goes through a single synchronization point (a
//! plain mutex; the lock is never held across an await), which is what
//! makes two concurrent lookups for the same identity converge on one
//! instance: the second caller observes the first one's registration.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bson::Document;
use bson::oid::ObjectId;
use tracing::trace;

use crate::entity::{Entity, EntityInner, Model};
use crate::error::{MappingError, MappingResult};

/// Content hash of a serialized document, used for dirty checking.
///
/// Two hashes compare equal exactly when the serialized bytes were equal;
/// a save whose hash matches the pool's recorded hash skips the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Hashes the serialized form of a document.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be BSON-encoded.
    pub fn of(document: &Document) -> MappingResult<Self> {
        let bytes = bson::ser::serialize_to_vec(document)?;

        Ok(ContentHash(blake3::hash(&bytes)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    collection: &'static str,
    id: ObjectId,
}

struct PoolEntry {
    handle: Weak<dyn Any + Send + Sync>,
    saved_hash: Option<ContentHash>,
}

/// The process-wide identity map and dirty-check cache.
///
/// Cheap to clone; all clones share the same entries. One pool is created
/// per [`Context`](crate::context::Context) at startup and lives for the
/// whole run (contexts can share a pool explicitly when several backends
/// map the same identity space).
#[derive(Clone, Default)]
pub struct EntityPool {
    inner: Arc<Mutex<HashMap<PoolKey, PoolEntry>>>,
}

impl EntityPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PoolKey, PoolEntry>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn key<M: Model>(id: ObjectId) -> PoolKey {
        PoolKey { collection: M::collection_name(), id }
    }

    /// Returns the live instance for the document's identity, or
    /// deserializes, registers and returns a fresh one.
    ///
    /// When an instance is already live its fields are **not** refreshed
    /// from the document: the in-memory copy may hold uncommitted
    /// application state, so it stays authoritative over document
    /// freshness.
    ///
    /// # Errors
    ///
    /// `CannotDeserialize` when the document lacks an identity field, or
    /// the model's own error when its fields do not match the schema.
    pub fn instantiate_if_needed<M: Model>(&self, document: &Document) -> MappingResult<Entity<M>> {
        let id = document
            .get_object_id("_id")
            .map_err(|e| MappingError::CannotDeserialize {
                collection: M::collection_name(),
                reason: format!("missing or invalid identity field: {e}"),
            })?;
        let key = Self::key::<M>(id);

        let mut entries = self.entries();

        if let Some(entry) = entries.get(&key) {
            if let Some(live) = entry.handle.upgrade() {
                if let Ok(inner) = live.downcast::<EntityInner<M>>() {
                    trace!(collection = key.collection, id = %id, "identity pool hit");

                    return Ok(Entity::from_inner(inner));
                }
            }
        }

        // Miss, or a dead weak handle left behind by a dropped instance.
        let entity = Entity::rehydrated(M::deserialize(document)?);
        let inner = Arc::clone(entity.inner());
        let erased: Arc<dyn Any + Send + Sync> = inner;

        entries.insert(
            key,
            PoolEntry {
                handle: Arc::downgrade(&erased),
                // The document came straight from storage, so its content
                // is the last persisted content.
                saved_hash: ContentHash::of(document).ok(),
            },
        );
        trace!(collection = M::collection_name(), id = %id, "registered fresh instance");

        Ok(entity)
    }

    /// Registers or refreshes the weak handle for an already-constructed
    /// entity.
    ///
    /// Called right before a save so a concurrent read finds the in-flight
    /// instance instead of constructing a duplicate. A recorded hash for
    /// the identity is preserved.
    pub fn pool<M: Model>(&self, entity: &Entity<M>) {
        let key = Self::key::<M>(entity.id());
        let inner = Arc::clone(entity.inner());
        let erased: Arc<dyn Any + Send + Sync> = inner;
        let handle = Arc::downgrade(&erased);

        self.entries()
            .entry(key)
            .and_modify(|entry| entry.handle = handle.clone())
            .or_insert(PoolEntry { handle, saved_hash: None });
    }

    /// The last recorded persisted-content hash for the entity's identity,
    /// or `None` if it was never saved (or was invalidated).
    pub fn existing_hash<M: Model>(&self, entity: &Entity<M>) -> Option<ContentHash> {
        self.entries()
            .get(&Self::key::<M>(entity.id()))
            .and_then(|entry| entry.saved_hash)
    }

    /// Records the content hash after a successful write.
    pub fn update_hash<M: Model>(&self, entity: &Entity<M>, hash: ContentHash) {
        if let Some(entry) = self
            .entries()
            .get_mut(&Self::key::<M>(entity.id()))
        {
            entry.saved_hash = Some(hash);
        }
    }

    /// Drops the entry for an identity.
    ///
    /// Called synchronously during delete, so a deleted identity cannot be
    /// resurrected through a stale cached hash.
    pub fn invalidate(&self, collection: &'static str, id: ObjectId) {
        self.entries()
            .remove(&PoolKey { collection, id });
        trace!(collection, id = %id, "pool entry invalidated");
    }
}

impl std::fmt::Debug for EntityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityPool")
            .field("entries", &self.entries().len())
            .finish()
    }
}
