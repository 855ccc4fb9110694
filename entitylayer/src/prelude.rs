//! Convenient re-exports of commonly used types from entitylayer.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use entitylayer::prelude::*;
//! ```

pub use entitylayer_core::{
    backend::{CollectionBackend, DocumentStream, RemoveOutcome, UpdateOutcome},
    context::{Context, EntityCollection, EntityStream, SaveOutcome},
    entity::{Entity, EntityState, Model, ModelValues},
    error::{MappingError, MappingResult},
    key::{IDENTITY_KEY, Key, KeyPath, ModelFields},
    pool::{ContentHash, EntityPool},
    primitive::{MapKey, OrderedValue, Primitive},
    query::{Expr, FieldOp, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    reference::{Reference, ReferenceDescriptor, ReferenceSet},
    serialize::{DocumentReader, DocumentWriter},
    string_enum,
};

pub use bson::Document;
pub use bson::oid::ObjectId;
