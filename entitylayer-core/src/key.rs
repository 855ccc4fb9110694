//! Typed field keys shared by the serializer and the query builder.
//!
//! A [`Key<V>`] carries a field's wire name together with its value type,
//! so the same descriptor drives packing, unpacking and query construction
//! without any chance of a field-name typo or a type-mismatched comparison
//! reaching the storage layer.

use std::borrow::Cow;
use std::marker::PhantomData;

use bson::oid::ObjectId;

use crate::primitive::Primitive;

/// A dotted wire path addressing a field, possibly inside nested
/// sub-documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    path: Cow<'static, str>,
}

impl KeyPath {
    /// The empty root path.
    pub const fn root() -> Self {
        KeyPath { path: Cow::Borrowed("") }
    }

    /// A path consisting of a single segment.
    pub const fn new(name: &'static str) -> Self {
        KeyPath { path: Cow::Borrowed(name) }
    }

    /// Appends a segment, inserting the dot separator where needed.
    pub fn child(&self, name: &str) -> KeyPath {
        if self.path.is_empty() {
            KeyPath { path: Cow::Owned(name.to_owned()) }
        } else {
            KeyPath { path: Cow::Owned(format!("{}.{}", self.path, name)) }
        }
    }

    /// A typed key for a field under this path.
    pub fn key<V: Primitive>(&self, name: &'static str) -> Key<V> {
        Key { path: self.child(name), _marker: PhantomData }
    }

    /// The dotted wire representation.
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

/// A typed descriptor of one schema field.
///
/// The phantom parameter is the field's declared value type; operator
/// methods on keys (see [`crate::query`]) are only available for
/// compatible types, and the reader/writer pair in [`crate::serialize`]
/// uses the same descriptor, so the serializer and the query builder can
/// never disagree about a field.
pub struct Key<V> {
    path: KeyPath,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Primitive> Key<V> {
    /// A root-level key with the given wire name.
    pub const fn new(name: &'static str) -> Self {
        Key { path: KeyPath::new(name), _marker: PhantomData }
    }

    /// A key at an explicit path (used by nested field proxies).
    pub fn at(path: KeyPath) -> Self {
        Key { path, _marker: PhantomData }
    }

    /// The key's dotted wire name.
    pub fn name(&self) -> &str {
        self.path.as_str()
    }

    /// The key's path, for building nested proxies below this field.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }
}

impl<V> Clone for Key<V> {
    fn clone(&self) -> Self {
        Key { path: self.path.clone(), _marker: PhantomData }
    }
}

impl<V> std::fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Key").field(&self.path.as_str()).finish()
    }
}

/// The wire name of the identity field every stored entity carries.
pub const IDENTITY_KEY: Key<ObjectId> = Key::new("_id");

/// Per-entity-type query proxy.
///
/// A model's `Fields` type exposes one typed [`Key`] per schema field.
/// Composite fields return a nested proxy scoped with a dotted prefix, so
/// deeply nested fields keep the same compile-time checking:
///
/// ```ignore
/// struct CatFields {
///     path: KeyPath,
/// }
///
/// impl CatFields {
///     fn name(&self) -> Key<String> {
///         self.path.key("name")
///     }
///
///     fn profile(&self) -> ProfileFields {
///         ProfileFields::scoped(self.path.child("profile"))
///     }
/// }
///
/// impl ModelFields for CatFields {
///     fn scoped(path: KeyPath) -> Self {
///         CatFields { path }
///     }
/// }
/// ```
pub trait ModelFields {
    /// A proxy whose keys are prefixed with the given path.
    fn scoped(prefix: KeyPath) -> Self;

    /// The root proxy for top-level fields.
    fn root() -> Self
    where
        Self: Sized,
    {
        Self::scoped(KeyPath::root())
    }
}
