//! Lazy, identity-based links between entities.
//!
//! Entity-valued fields never inline a copy of the target: they store a
//! [`ReferenceDescriptor`], a (collection, identity) pair, and resolve it
//! on demand through the identity pool. That keeps shared entities
//! consistent (two fields referencing the same entity resolve to the same
//! live instance) and makes cyclic references safe: nothing is resolved
//! eagerly, so a cycle is just two descriptors pointing at each other.

use std::marker::PhantomData;

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::backend::CollectionBackend;
use crate::context::Context;
use crate::entity::{Entity, Model};
use crate::error::{MappingError, MappingResult};
use crate::primitive::Primitive;

/// The stored form of a cross-entity link: the target's collection and
/// identity, laid out as `{"$ref": <collection>, "$id": <id>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    /// Collection the target entity lives in.
    #[serde(rename = "$ref")]
    pub collection: String,
    /// Identity of the target entity.
    #[serde(rename = "$id")]
    pub id: ObjectId,
}

impl ReferenceDescriptor {
    /// A descriptor pointing at the given collection and identity.
    pub fn new(collection: impl Into<String>, id: ObjectId) -> Self {
        ReferenceDescriptor { collection: collection.into(), id }
    }

    fn broken(&self) -> MappingError {
        MappingError::BrokenReference {
            collection: self.collection.clone(),
            id: self.id,
        }
    }

    /// Resolves this descriptor against a closed set of acceptable entity
    /// types.
    ///
    /// The set's declared collections are tried strictly in declaration
    /// order; the first one that yields the identity wins. Resolution goes
    /// through the identity pool, so the single-instance guarantee holds
    /// across polymorphic reference chains too.
    ///
    /// # Errors
    ///
    /// `BrokenReference` when no declared collection holds the identity.
    pub async fn resolve_in_set<S, B>(&self, context: &Context<B>) -> MappingResult<S>
    where
        S: ReferenceSet,
        B: CollectionBackend,
    {
        for collection in S::collections() {
            if let Some(member) = S::resolve_member(context, collection, self.id).await? {
                return Ok(member);
            }
        }

        Err(self.broken())
    }
}

impl Primitive for ReferenceDescriptor {
    fn to_primitive(&self) -> Bson {
        let mut doc = Document::new();
        doc.insert("$ref", self.collection.clone());
        doc.insert("$id", self.id);

        Bson::Document(doc)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        let doc = match value {
            Bson::Document(doc) => doc,
            _ => return Err(MappingError::invalid("a reference descriptor")),
        };

        let collection = doc
            .get_str("$ref")
            .map_err(|_| MappingError::invalid("a reference descriptor with `$ref`"))?
            .to_owned();
        let id = doc
            .get_object_id("$id")
            .map_err(|_| MappingError::invalid("a reference descriptor with `$id`"))?;

        Ok(ReferenceDescriptor { collection, id })
    }
}

/// A typed, lazy link to one entity of type `M`.
///
/// Holds only the target's identity; the target is fetched when
/// [`resolve`](Reference::resolve) is called. Declare reference fields as
/// `Reference<M>` (or `Option<Reference<M>>` when the link itself is
/// optional).
pub struct Reference<M: Model> {
    id: ObjectId,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Reference<M> {
    /// A reference to a live entity.
    pub fn to(entity: &Entity<M>) -> Self {
        Reference { id: entity.id(), _marker: PhantomData }
    }

    /// A reference to a known identity.
    ///
    /// The identity is not checked here; a dangling identity surfaces as
    /// `BrokenReference` at resolve time.
    pub fn from_id(id: ObjectId) -> Self {
        Reference { id, _marker: PhantomData }
    }

    /// The target's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The stored descriptor form of this reference.
    pub fn descriptor(&self) -> ReferenceDescriptor {
        ReferenceDescriptor::new(M::collection_name(), self.id)
    }

    /// Fetches the target entity through the identity pool.
    ///
    /// # Errors
    ///
    /// `BrokenReference` when the identity no longer exists in the target
    /// collection.
    pub async fn resolve<B: CollectionBackend>(
        &self,
        context: &Context<B>,
    ) -> MappingResult<Entity<M>> {
        context
            .collection::<M>()
            .find_by_id(self.id)
            .await?
            .ok_or_else(|| self.descriptor().broken())
    }
}

impl<M: Model> Primitive for Reference<M> {
    fn to_primitive(&self) -> Bson {
        self.descriptor().to_primitive()
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        let descriptor = ReferenceDescriptor::from_primitive(value)?;

        // The declared acceptable type for a typed reference field is
        // exactly `M`; a descriptor into any other collection is broken,
        // never silently coerced.
        if descriptor.collection != M::collection_name() {
            return Err(descriptor.broken());
        }

        Ok(Reference::from_id(descriptor.id))
    }
}

impl<M: Model> Clone for Reference<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Model> Copy for Reference<M> {}

impl<M: Model> PartialEq for Reference<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M: Model> Eq for Reference<M> {}

impl<M: Model> std::fmt::Debug for Reference<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reference")
            .field("collection", &M::collection_name())
            .field("id", &self.id)
            .finish()
    }
}

/// A closed set of entity types a polymorphic reference may resolve to.
///
/// Implemented on an application-defined enum whose variants wrap the
/// acceptable entity types (for example every type satisfying some
/// capability). [`collections`](ReferenceSet::collections) declares the
/// member collections; resolution tries them strictly in declaration
/// order and the first identity hit wins, so overlapping identity spaces
/// resolve to the earliest-declared member.
///
/// ```ignore
/// enum CatLike {
///     Cat(Entity<Cat>),
///     Tiger(Entity<Tiger>),
/// }
///
/// #[async_trait]
/// impl ReferenceSet for CatLike {
///     fn collections() -> &'static [&'static str] {
///         &["cats", "tigers"]
///     }
///
///     async fn resolve_member<B: CollectionBackend>(
///         context: &Context<B>,
///         collection: &str,
///         id: ObjectId,
///     ) -> MappingResult<Option<Self>> {
///         match collection {
///             "cats" => Ok(context.collection::<Cat>().find_by_id(id).await?.map(CatLike::Cat)),
///             "tigers" => Ok(context.collection::<Tiger>().find_by_id(id).await?.map(CatLike::Tiger)),
///             _ => Ok(None),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ReferenceSet: Sized + Send + Sync + 'static {
    /// The member collections, in resolution order.
    fn collections() -> &'static [&'static str];

    /// Looks the identity up in one member collection, wrapping a hit in
    /// the set's own representation.
    async fn resolve_member<B: CollectionBackend>(
        context: &Context<B>,
        collection: &str,
        id: ObjectId,
    ) -> MappingResult<Option<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips() {
        let descriptor = ReferenceDescriptor::new("breeds", ObjectId::new());

        let packed = descriptor.to_primitive();
        let doc = packed.as_document().unwrap();
        assert_eq!(doc.get_str("$ref").unwrap(), "breeds");

        let restored = ReferenceDescriptor::from_primitive(packed).unwrap();
        assert_eq!(restored, descriptor);
    }

    #[test]
    fn descriptor_without_identity_fails_to_unpack() {
        let mut doc = Document::new();
        doc.insert("$ref", "breeds");

        assert!(ReferenceDescriptor::from_primitive(Bson::Document(doc)).is_err());
    }
}
