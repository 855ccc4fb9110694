//! Conversion between typed values and raw document primitives.
//!
//! Every value that can live in a stored document implements [`Primitive`]:
//! scalars, sequences, sets, maps, tuples, closed enumerations and nested
//! composites all reduce to a [`Bson`] primitive and back. Packing is
//! infallible by construction; unpacking checks the stored shape and fails
//! with a mapping error when it does not match the expected type.
//!
//! # Containers
//!
//! - Sequences and sets store as arrays.
//! - Fixed-size tuples store as a sub-document keyed `"0"`, `"1"`, ... so
//!   the element types may differ.
//! - String-keyed maps store as a plain sub-document. Maps with any other
//!   key type store as a sub-document holding parallel `"keys"` and
//!   `"values"` arrays, selected by the key's [`MapKey`] implementation.
//!
//! # Enumerations
//!
//! Closed string-tagged enumerations are declared with [`string_enum!`];
//! an unknown tag fails with `EnumCaseNotFound` rather than falling back
//! to a default case.

use bson::{Binary, Bson, Document, oid::ObjectId};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::{MappingError, MappingResult};

/// Capability to convert a typed value to and from a raw document primitive.
///
/// Implement this for any type that appears as a field of a stored entity.
/// Composite value types implement it by packing their own sub-document
/// (see [`crate::serialize::DocumentWriter`]); entity-valued fields must go
/// through [`crate::reference::Reference`] instead of implementing
/// `Primitive` directly, so shared entities are stored by identity and
/// never as duplicated inline copies.
pub trait Primitive: Sized {
    /// Converts this value into its stored primitive representation.
    fn to_primitive(&self) -> Bson;

    /// Rebuilds a value from its stored primitive representation.
    ///
    /// # Errors
    ///
    /// Fails when the stored primitive's shape does not match this type.
    fn from_primitive(value: Bson) -> MappingResult<Self>;
}

/// Marker for primitive types with a total order on the wire.
///
/// Range operators on query keys are only available for these types;
/// string fields intentionally expose equality and prefix matching only.
pub trait OrderedValue: Primitive {}

impl Primitive for String {
    fn to_primitive(&self) -> Bson {
        Bson::String(self.clone())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::String(s) => Ok(s),
            _ => Err(MappingError::invalid("a string")),
        }
    }
}

impl Primitive for bool {
    fn to_primitive(&self) -> Bson {
        Bson::Boolean(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Boolean(b) => Ok(b),
            _ => Err(MappingError::invalid("a boolean")),
        }
    }
}

impl Primitive for i32 {
    fn to_primitive(&self) -> Bson {
        Bson::Int32(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Int32(n) => Ok(n),
            _ => Err(MappingError::invalid("a 32-bit integer")),
        }
    }
}

impl Primitive for i64 {
    fn to_primitive(&self) -> Bson {
        Bson::Int64(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Int64(n) => Ok(n),
            // Stored 32-bit integers widen losslessly.
            Bson::Int32(n) => Ok(n as i64),
            _ => Err(MappingError::invalid("a 64-bit integer")),
        }
    }
}

impl Primitive for f64 {
    fn to_primitive(&self) -> Bson {
        Bson::Double(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Double(n) => Ok(n),
            Bson::Int32(n) => Ok(n as f64),
            Bson::Int64(n) => Ok(n as f64),
            _ => Err(MappingError::invalid("a number")),
        }
    }
}

impl Primitive for ObjectId {
    fn to_primitive(&self) -> Bson {
        Bson::ObjectId(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::ObjectId(id) => Ok(id),
            _ => Err(MappingError::invalid("an object id")),
        }
    }
}

impl Primitive for bson::DateTime {
    fn to_primitive(&self) -> Bson {
        Bson::DateTime(*self)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::DateTime(dt) => Ok(dt),
            _ => Err(MappingError::invalid("a datetime")),
        }
    }
}

impl Primitive for chrono::DateTime<Utc> {
    fn to_primitive(&self) -> Bson {
        Bson::DateTime(bson::DateTime::from_chrono(*self))
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::DateTime(dt) => Ok(dt.to_chrono()),
            _ => Err(MappingError::invalid("a datetime")),
        }
    }
}

impl Primitive for bson::Uuid {
    fn to_primitive(&self) -> Bson {
        Bson::Binary(Binary::from_uuid(*self))
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Binary(binary) => binary
                .to_uuid()
                .map_err(|_| MappingError::invalid("a uuid")),
            _ => Err(MappingError::invalid("a uuid")),
        }
    }
}

impl Primitive for uuid::Uuid {
    fn to_primitive(&self) -> Bson {
        bson::Uuid::from(*self).to_primitive()
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        bson::Uuid::from_primitive(value).map(uuid::Uuid::from)
    }
}

/// Raw binary payloads store as-is.
impl Primitive for Binary {
    fn to_primitive(&self) -> Bson {
        Bson::Binary(self.clone())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Binary(binary) => Ok(binary),
            _ => Err(MappingError::invalid("a binary payload")),
        }
    }
}

/// A raw nested document passes through untouched.
impl Primitive for Document {
    fn to_primitive(&self) -> Bson {
        Bson::Document(self.clone())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Document(doc) => Ok(doc),
            _ => Err(MappingError::invalid("a document")),
        }
    }
}

impl<T: Primitive> Primitive for Vec<T> {
    fn to_primitive(&self) -> Bson {
        Bson::Array(self.iter().map(Primitive::to_primitive).collect())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Array(items) => items
                .into_iter()
                .map(T::from_primitive)
                .collect(),
            _ => Err(MappingError::invalid("an array")),
        }
    }
}

impl<T: Primitive + Eq + Hash> Primitive for HashSet<T> {
    fn to_primitive(&self) -> Bson {
        Bson::Array(self.iter().map(Primitive::to_primitive).collect())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Array(items) => items
                .into_iter()
                .map(T::from_primitive)
                .collect(),
            _ => Err(MappingError::invalid("an array")),
        }
    }
}

/// Key capability for maps stored inside documents.
///
/// Plain-string keys embed directly as document keys; every other key type
/// falls back to the parallel `"keys"`/`"values"` array encoding.
pub trait MapKey: Primitive + Eq + Hash {
    /// True when keys of this type are stored directly as document keys.
    const PLAIN: bool = false;

    /// The document key for this value. Only consulted when [`PLAIN`] is
    /// true.
    ///
    /// [`PLAIN`]: MapKey::PLAIN
    fn as_document_key(&self) -> Option<String> {
        None
    }

    /// Rebuilds a key from a document key. Only consulted when [`PLAIN`]
    /// is true.
    ///
    /// [`PLAIN`]: MapKey::PLAIN
    fn from_document_key(_key: &str) -> Option<Self> {
        None
    }
}

impl MapKey for String {
    const PLAIN: bool = true;

    fn as_document_key(&self) -> Option<String> {
        Some(self.clone())
    }

    fn from_document_key(key: &str) -> Option<Self> {
        Some(key.to_owned())
    }
}

impl MapKey for i32 {}
impl MapKey for i64 {}
impl MapKey for ObjectId {}

impl<K: MapKey, V: Primitive> Primitive for HashMap<K, V> {
    fn to_primitive(&self) -> Bson {
        if K::PLAIN {
            Bson::Document(
                self.iter()
                    .filter_map(|(k, v)| {
                        k.as_document_key()
                            .map(|key| (key, v.to_primitive()))
                    })
                    .collect(),
            )
        } else {
            let mut keys = Vec::with_capacity(self.len());
            let mut values = Vec::with_capacity(self.len());

            for (k, v) in self {
                keys.push(k.to_primitive());
                values.push(v.to_primitive());
            }

            let mut doc = Document::new();
            doc.insert("keys", Bson::Array(keys));
            doc.insert("values", Bson::Array(values));

            Bson::Document(doc)
        }
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        let doc = match value {
            Bson::Document(doc) => doc,
            _ => return Err(MappingError::invalid("a map document")),
        };

        if K::PLAIN {
            return doc
                .into_iter()
                .map(|(key, value)| {
                    let k = K::from_document_key(&key)
                        .ok_or_else(|| MappingError::invalid("a map key"))?;

                    Ok((k, V::from_primitive(value)?))
                })
                .collect();
        }

        let keys = match doc.get("keys") {
            Some(Bson::Array(keys)) => keys.clone(),
            _ => return Err(MappingError::invalid("a keyed map with a `keys` array")),
        };
        let values = match doc.get("values") {
            Some(Bson::Array(values)) => values.clone(),
            _ => return Err(MappingError::invalid("a keyed map with a `values` array")),
        };

        if keys.len() != values.len() {
            return Err(MappingError::invalid("equal-length `keys` and `values` arrays"));
        }

        keys.into_iter()
            .zip(values)
            .map(|(k, v)| Ok((K::from_primitive(k)?, V::from_primitive(v)?)))
            .collect()
    }
}

impl<A: Primitive, B: Primitive> Primitive for (A, B) {
    fn to_primitive(&self) -> Bson {
        let mut doc = Document::new();
        doc.insert("0", self.0.to_primitive());
        doc.insert("1", self.1.to_primitive());

        Bson::Document(doc)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Document(doc) => Ok((
                tuple_element(&doc, "0")?,
                tuple_element(&doc, "1")?,
            )),
            _ => Err(MappingError::invalid("a 2-tuple document")),
        }
    }
}

impl<A: Primitive, B: Primitive, C: Primitive> Primitive for (A, B, C) {
    fn to_primitive(&self) -> Bson {
        let mut doc = Document::new();
        doc.insert("0", self.0.to_primitive());
        doc.insert("1", self.1.to_primitive());
        doc.insert("2", self.2.to_primitive());

        Bson::Document(doc)
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        match value {
            Bson::Document(doc) => Ok((
                tuple_element(&doc, "0")?,
                tuple_element(&doc, "1")?,
                tuple_element(&doc, "2")?,
            )),
            _ => Err(MappingError::invalid("a 3-tuple document")),
        }
    }
}

fn tuple_element<T: Primitive>(doc: &Document, index: &'static str) -> MappingResult<T> {
    let value = doc
        .get(index)
        .ok_or(MappingError::invalid("a tuple element"))?;

    T::from_primitive(value.clone()).map_err(|e| e.at_key(index))
}

impl OrderedValue for i32 {}
impl OrderedValue for i64 {}
impl OrderedValue for f64 {}
impl OrderedValue for bson::DateTime {}
impl OrderedValue for chrono::DateTime<Utc> {}

/// Declares a closed, string-tagged enumeration.
///
/// Each case maps to exactly one wire tag; reading an unknown tag fails
/// with [`EnumCaseNotFound`](crate::error::MappingError::EnumCaseNotFound)
/// instead of falling back to any default case.
///
/// ```ignore
/// entitylayer_core::string_enum! {
///     pub enum Country {
///         UnitedStates => "unitedStates",
///         Thailand => "thailand",
///     }
/// }
/// ```
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($case:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($case),+
        }

        impl $name {
            /// The serialized wire tag of this case.
            $vis fn tag(&self) -> &'static str {
                match self {
                    $(Self::$case => $tag),+
                }
            }
        }

        impl $crate::primitive::Primitive for $name {
            fn to_primitive(&self) -> $crate::bson::Bson {
                $crate::bson::Bson::String(self.tag().to_string())
            }

            fn from_primitive(
                value: $crate::bson::Bson,
            ) -> $crate::error::MappingResult<Self> {
                match value {
                    $crate::bson::Bson::String(tag) => match tag.as_str() {
                        $($tag => Ok(Self::$case),)+
                        _ => Err($crate::error::MappingError::EnumCaseNotFound {
                            name: stringify!($name),
                            tag,
                        }),
                    },
                    _ => Err($crate::error::MappingError::MissingOrInvalidValue {
                        key: String::new(),
                        expected: "an enumeration tag",
                    }),
                }
            }
        }
    };
}
