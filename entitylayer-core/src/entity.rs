//! Identity-bearing domain objects and their in-memory handles.
//!
//! A [`Model`] describes how one entity type maps to raw documents: its
//! collection, its identity, how its fields pack and unpack, and its
//! lifecycle hooks. Application code never holds a model directly once it
//! is live; it holds an [`Entity`] handle, which shares the model behind
//! an async lock so the identity pool can hand the same instance to every
//! caller.
//!
//! # Lifecycle
//!
//! A handle is either `Transient` (minted identity, never persisted),
//! `Persisted` (read from or written to storage at least once) or
//! `Deleted` (terminal). Save and delete on a deleted handle fail fast;
//! an identity is never reused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bson::Document;
use bson::oid::ObjectId;
use mea::rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{MappingError, MappingResult};
use crate::key::ModelFields;

/// A typed, identity-bearing, persistable domain object.
///
/// Implementations state the mapping of one entity type: the collection it
/// lives in, the identity field, field packing and unpacking, the
/// optional-field mirror used for partial updates and the typed query
/// proxy. The lifecycle hooks default to no-ops.
///
/// Entity-valued fields must be declared as
/// [`Reference`](crate::reference::Reference)s so shared entities are
/// stored by identity, never as inline copies.
pub trait Model: Send + Sync + Sized + 'static {
    /// Optional-field mirror of this model's schema, applied by
    /// [`Entity::update_with`]. Never identity-bearing, never pooled.
    type Values: ModelValues;

    /// Typed query proxy exposing one [`Key`](crate::key::Key) per field.
    type Fields: ModelFields;

    /// The name of the collection documents of this type are stored in.
    fn collection_name() -> &'static str;

    /// This entity's identity, assigned at creation and immutable.
    fn id(&self) -> ObjectId;

    /// Packs the declared schema fields into a raw document.
    ///
    /// The identity field is not part of the output; the lifecycle layer
    /// attaches it when the document is written.
    fn serialize(&self) -> Document;

    /// Rebuilds a model from a stored document (identity field included).
    ///
    /// # Errors
    ///
    /// Fails when the document does not match the declared schema. Only
    /// documents produced by this mapping layer are guaranteed to round
    /// trip.
    fn deserialize(document: &Document) -> MappingResult<Self>;

    /// Applies a validated set of partial values to this model.
    fn apply(&mut self, values: Self::Values);

    /// Called before a save; returning an error aborts the save with no
    /// write and no observable mutation.
    fn will_save(&mut self) -> MappingResult<()> {
        Ok(())
    }

    /// Called after a save attempt completed; `was_updated` is false when
    /// the dirty check skipped the write.
    fn did_save(&mut self, was_updated: bool) {
        let _ = was_updated;
    }

    /// Called before a delete; returning an error aborts the delete.
    fn will_delete(&mut self) -> MappingResult<()> {
        Ok(())
    }

    /// Called after a delete completed.
    fn did_delete(&mut self) {}
}

/// The optional-field mirror of a model's schema.
///
/// Deserialization validates every declared key present in the document in
/// one pass and builds the full value set before anything is applied, so a
/// malformed partial update can never leave an entity half-mutated.
pub trait ModelValues: Sized {
    /// Unpacks the values present in a partial document.
    ///
    /// # Errors
    ///
    /// Fails when any present declared key has the wrong shape; absent
    /// keys simply stay `None`.
    fn deserialize(document: &Document) -> MappingResult<Self>;
}

/// Lifecycle state of one entity handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Minted identity, never queried or saved.
    Transient,
    /// Read from or written to storage at least once.
    Persisted,
    /// Deleted; terminal. Further save or delete attempts fail.
    Deleted,
}

const STATE_TRANSIENT: u8 = 0;
const STATE_PERSISTED: u8 = 1;
const STATE_DELETED: u8 = 2;

pub(crate) struct EntityInner<M> {
    pub(crate) id: ObjectId,
    pub(crate) model: RwLock<M>,
    state: AtomicU8,
}

/// A shared handle to one live entity instance.
///
/// Handles are cheap to clone; all clones refer to the same instance. The
/// identity pool guarantees at most one live instance per
/// (entity type, identity), so handle pointer equality ([`Entity::ptr_eq`])
/// witnesses stored-entity identity.
pub struct Entity<M: Model> {
    inner: Arc<EntityInner<M>>,
}

impl<M: Model> Entity<M> {
    /// Wraps a freshly created model into a `Transient` handle.
    pub fn new(model: M) -> Self {
        Self::with_state(model, STATE_TRANSIENT)
    }

    /// Wraps a model reconstructed from a stored document.
    pub(crate) fn rehydrated(model: M) -> Self {
        Self::with_state(model, STATE_PERSISTED)
    }

    fn with_state(model: M, state: u8) -> Self {
        let id = model.id();

        Entity {
            inner: Arc::new(EntityInner {
                id,
                model: RwLock::new(model),
                state: AtomicU8::new(state),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EntityInner<M>>) -> Self {
        Entity { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<EntityInner<M>> {
        &self.inner
    }

    /// This entity's identity.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// The handle's current lifecycle state.
    pub fn state(&self) -> EntityState {
        match self.inner.state.load(Ordering::SeqCst) {
            STATE_TRANSIENT => EntityState::Transient,
            STATE_PERSISTED => EntityState::Persisted,
            _ => EntityState::Deleted,
        }
    }

    pub(crate) fn mark_persisted(&self) {
        self.inner
            .state
            .store(STATE_PERSISTED, Ordering::SeqCst);
    }

    pub(crate) fn mark_deleted(&self) {
        self.inner
            .state
            .store(STATE_DELETED, Ordering::SeqCst);
    }

    /// Fails with `EntityDeleted` once the handle reached its terminal
    /// state.
    pub(crate) fn ensure_live(&self) -> MappingResult<()> {
        if self.state() == EntityState::Deleted {
            return Err(MappingError::EntityDeleted(self.inner.id));
        }

        Ok(())
    }

    /// Acquires shared read access to the model.
    pub async fn read(&self) -> RwLockReadGuard<'_, M> {
        self.inner.model.read().await
    }

    /// Acquires exclusive write access to the model.
    pub async fn write(&self) -> RwLockWriteGuard<'_, M> {
        self.inner.model.write().await
    }

    /// Applies a partial update document, all-or-nothing.
    ///
    /// Every present declared key is validated first (a dry run building
    /// the full [`Model::Values`] set); only then is anything applied, so
    /// a document with one valid and one invalid field mutates nothing.
    ///
    /// # Errors
    ///
    /// Fails with the offending field's error, or `EntityDeleted` on a
    /// deleted handle.
    pub async fn update_with(&self, document: &Document) -> MappingResult<()> {
        self.ensure_live()?;

        let values = M::Values::deserialize(document)?;
        self.inner.model.write().await.apply(values);

        Ok(())
    }

    /// Whether two handles refer to the same live instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<M: Model> Clone for Entity<M> {
    fn clone(&self) -> Self {
        Entity { inner: Arc::clone(&self.inner) }
    }
}

impl<M: Model> std::fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("collection", &M::collection_name())
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}
