//! The persistence context and per-entity-type operation surface.
//!
//! A [`Context`] ties a collection backend to one identity pool for the
//! lifetime of the process. [`Context::collection`] hands out the typed
//! operation surface for one entity type, through which every find, save
//! and delete flows, so the identity-map and dirty-checking guarantees
//! hold no matter which call path touched an entity first.

use std::marker::PhantomData;

use bson::oid::ObjectId;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, warn};

use crate::backend::CollectionBackend;
use crate::entity::{Entity, Model};
use crate::error::{MappingError, MappingResult};
use crate::key::{IDENTITY_KEY, ModelFields};
use crate::pool::{ContentHash, EntityPool};
use crate::query::{Expr, Query};

/// A lazily-driven sequence of entities produced by a find.
///
/// Each raw document is mapped through the identity pool as the stream is
/// driven, so already-live instances are reused and never duplicated.
pub type EntityStream<M> = BoxStream<'static, MappingResult<Entity<M>>>;

/// What a save actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The document was written (inserted or replaced).
    Written,
    /// The content hash matched the last persisted hash; no write was
    /// issued.
    Skipped,
}

impl SaveOutcome {
    /// True when a write was actually issued.
    pub fn was_updated(&self) -> bool {
        matches!(self, SaveOutcome::Written)
    }
}

/// Binds a backend and an identity pool together.
///
/// Create one context at process start and share it; the pool it owns is
/// the process-wide identity map. Several contexts may share one pool
/// explicitly via [`Context::with_pool`] when they map the same identity
/// space.
#[derive(Debug)]
pub struct Context<B: CollectionBackend> {
    backend: B,
    pool: EntityPool,
}

impl<B: CollectionBackend> Context<B> {
    /// Creates a context with its own fresh identity pool.
    pub fn new(backend: B) -> Self {
        Context { backend, pool: EntityPool::new() }
    }

    /// Creates a context sharing an existing identity pool.
    pub fn with_pool(backend: B, pool: EntityPool) -> Self {
        Context { backend, pool }
    }

    /// The identity pool this context registers entities in.
    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    /// The underlying collection backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The typed operation surface for one entity type.
    pub fn collection<M: Model>(&self) -> EntityCollection<'_, B, M> {
        EntityCollection {
            name: M::collection_name(),
            backend: &self.backend,
            pool: &self.pool,
            _marker: PhantomData,
        }
    }
}

/// Typed persistence operations for one entity type.
///
/// Borrowed from a [`Context`]; cheap to create on demand.
#[derive(Debug)]
pub struct EntityCollection<'a, B: CollectionBackend, M: Model> {
    name: &'static str,
    backend: &'a B,
    pool: &'a EntityPool,
    _marker: PhantomData<fn() -> M>,
}

impl<'a, B: CollectionBackend, M: Model> EntityCollection<'a, B, M> {
    /// The name of the underlying collection.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn id_query(id: ObjectId) -> Query {
        IDENTITY_KEY.eq(id).into()
    }

    /// Returns a lazy stream of entities matching the query.
    pub async fn find(&self, query: impl Into<Query>) -> MappingResult<EntityStream<M>> {
        let documents = self.backend.find(self.name, query.into()).await?;
        let pool = self.pool.clone();

        Ok(documents
            .map(move |document| {
                document.and_then(|document| pool.instantiate_if_needed::<M>(&document))
            })
            .boxed())
    }

    /// [`find`](Self::find) with a typed query builder closure.
    pub async fn find_with<F>(&self, build: F) -> MappingResult<EntityStream<M>>
    where
        F: FnOnce(M::Fields) -> Expr,
    {
        self.find(build(M::Fields::root())).await
    }

    /// Returns the first entity matching the query, if any.
    pub async fn find_one(&self, query: impl Into<Query>) -> MappingResult<Option<Entity<M>>> {
        match self.backend.find_one(self.name, query.into()).await? {
            Some(document) => Ok(Some(self.pool.instantiate_if_needed(&document)?)),
            None => Ok(None),
        }
    }

    /// [`find_one`](Self::find_one) with a typed query builder closure.
    pub async fn find_one_with<F>(&self, build: F) -> MappingResult<Option<Entity<M>>>
    where
        F: FnOnce(M::Fields) -> Expr,
    {
        self.find_one(build(M::Fields::root())).await
    }

    /// Returns the entity with the given identity, if stored.
    pub async fn find_by_id(&self, id: ObjectId) -> MappingResult<Option<Entity<M>>> {
        self.find_one(Self::id_query(id)).await
    }

    /// Counts the entities matching the query.
    pub async fn count(&self, query: impl Into<Query>) -> MappingResult<u64> {
        self.backend.count(self.name, query.into()).await
    }

    /// [`count`](Self::count) with a typed query builder closure.
    pub async fn count_with<F>(&self, build: F) -> MappingResult<u64>
    where
        F: FnOnce(M::Fields) -> Expr,
    {
        self.count(build(M::Fields::root())).await
    }

    /// Saves the entity, skipping the write when its content is unchanged
    /// since the last save.
    ///
    /// The save path: `will_save` hook (an error aborts with no write),
    /// serialize with the identity field attached, register the handle in
    /// the pool, hash the document and compare against the pool's record.
    /// On a match the write is skipped and `did_save(false)` runs;
    /// otherwise an idempotent upsert keyed by identity goes out, the new
    /// hash is recorded and `did_save(true)` runs.
    ///
    /// The hash-compare-then-upsert pair is not atomic with respect to
    /// other writers of the same identity; the benign race costs a
    /// redundant write, never data, since the upsert carries the full
    /// current state.
    ///
    /// # Errors
    ///
    /// `EntityDeleted` on a deleted handle, the hook's own error when
    /// `will_save` aborts, or a backend error from the write.
    pub async fn save(&self, entity: &Entity<M>) -> MappingResult<SaveOutcome> {
        self.save_inner(entity, false).await
    }

    /// Saves unconditionally, bypassing the dirty check.
    pub async fn force_save(&self, entity: &Entity<M>) -> MappingResult<SaveOutcome> {
        self.save_inner(entity, true).await
    }

    async fn save_inner(&self, entity: &Entity<M>, force: bool) -> MappingResult<SaveOutcome> {
        entity.ensure_live()?;

        // The write guard is held across the whole save so the serialized
        // state, the recorded hash and the hooks all see one consistent
        // snapshot.
        let mut model = entity.write().await;
        model.will_save()?;

        let mut document = model.serialize();
        document.insert(IDENTITY_KEY.name(), entity.id());

        self.pool.pool(entity);

        let hash = ContentHash::of(&document)?;

        if !force && self.pool.existing_hash(entity) == Some(hash) {
            debug!(collection = self.name, id = %entity.id(), "save skipped, content unchanged");
            model.did_save(false);

            return Ok(SaveOutcome::Skipped);
        }

        self.backend
            .update(self.name, Self::id_query(entity.id()), document, true)
            .await?;

        self.pool.update_hash(entity, hash);
        entity.mark_persisted();
        model.did_save(true);
        debug!(collection = self.name, id = %entity.id(), "saved");

        Ok(SaveOutcome::Written)
    }

    /// Deletes the entity and invalidates its identity.
    ///
    /// The delete path: `will_delete` hook (an error aborts), synchronous
    /// pool invalidation, remove keyed by identity, `did_delete`, terminal
    /// `Deleted` state. The identity is never reused; a second delete (or
    /// a later save) on the same handle fails with `EntityDeleted`.
    pub async fn delete(&self, entity: &Entity<M>) -> MappingResult<()> {
        entity.ensure_live()?;

        let mut model = entity.write().await;
        model.will_delete()?;

        // Invalidate before the remove so a concurrent save cannot
        // resurrect the identity through a stale cached hash.
        self.pool.invalidate(self.name, entity.id());

        if let Err(error) = self
            .backend
            .remove(self.name, Self::id_query(entity.id()))
            .await
        {
            // The document is still stored; put the handle back so later
            // reads find this instance instead of constructing a
            // duplicate. The hash record stays gone, which only costs one
            // redundant write on the next save.
            self.pool.pool(entity);

            return Err(error);
        }

        entity.mark_deleted();
        model.did_delete();
        debug!(collection = self.name, id = %entity.id(), "deleted");

        Ok(())
    }

    /// Deletes every entity matching the query, one by one.
    ///
    /// Each match goes through the full delete path (hooks included). One
    /// entity's failure never aborts the sweep and never hides another's:
    /// all (identity, error) pairs are collected and raised together as a
    /// single `DeletingMultiple` aggregate after every match was
    /// attempted.
    ///
    /// Returns the number of entities actually deleted.
    pub async fn remove(&self, query: impl Into<Query>) -> MappingResult<u64> {
        let mut documents = self.backend.find(self.name, query.into()).await?;
        let mut removed = 0u64;
        let mut failures: Vec<(ObjectId, MappingError)> = Vec::new();

        while let Some(document) = documents.next().await {
            // A transport failure means the match stream itself is gone;
            // there is nothing left to iterate.
            let document = document?;
            let id = document
                .get_object_id(IDENTITY_KEY.name())
                .map_err(|e| MappingError::CannotDeserialize {
                    collection: M::collection_name(),
                    reason: format!("missing or invalid identity field: {e}"),
                })?;

            let outcome = match self.pool.instantiate_if_needed::<M>(&document) {
                Ok(entity) => self.delete(&entity).await,
                Err(error) => Err(error),
            };

            match outcome {
                Ok(()) => removed += 1,
                Err(error) => failures.push((id, error)),
            }
        }

        if failures.is_empty() {
            Ok(removed)
        } else {
            warn!(
                collection = self.name,
                failed = failures.len(),
                removed,
                "bulk remove completed with failures"
            );

            Err(MappingError::DeletingMultiple(failures))
        }
    }

    /// [`remove`](Self::remove) with a typed query builder closure.
    pub async fn remove_with<F>(&self, build: F) -> MappingResult<u64>
    where
        F: FnOnce(M::Fields) -> Expr,
    {
        self.remove(build(M::Fields::root())).await
    }
}
