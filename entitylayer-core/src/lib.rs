//! A runtime entity mapping layer over schemaless document stores.
//!
//! This crate is the core of the entitylayer project and provides:
//!
//! - **Primitive conversions** ([`primitive`]) - Typed values to and from raw document primitives
//! - **Typed field keys** ([`key`]) - Shared field descriptors for the serializer and the query builder
//! - **Pack/unpack surface** ([`serialize`]) - Key-driven document readers and writers
//! - **Typed queries** ([`query`]) - Compile-time checked query expression trees
//! - **Backend abstraction** ([`backend`]) - The collection collaborator boundary
//! - **Identity pool** ([`pool`]) - Identity map and dirty-check cache
//! - **Entities** ([`entity`]) - Models, live handles and lifecycle hooks
//! - **References** ([`reference`]) - Lazy identity-based links between entities
//! - **Persistence context** ([`context`]) - Find/save/delete operation surfaces
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use entitylayer_core::{context::Context, entity::{Entity, Model}};
//! use bson::oid::ObjectId;
//!
//! struct Breed {
//!     id: ObjectId,
//!     name: String,
//! }
//!
//! impl Model for Breed {
//!     type Values = BreedValues;
//!     type Fields = BreedFields;
//!
//!     fn collection_name() -> &'static str {
//!         "breeds"
//!     }
//!
//!     // ...
//! }
//!
//! let context = Context::new(backend);
//! let breeds = context.collection::<Breed>();
//!
//! let entity = Entity::new(Breed { id: ObjectId::new(), name: "Siamese".into() });
//! breeds.save(&entity).await?;
//!
//! let found = breeds
//!     .find_one_with(|breed| breed.name().eq("Siamese"))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as entitylayer_core;

pub mod backend;
pub mod context;
pub mod entity;
pub mod error;
pub mod key;
pub mod pool;
pub mod primitive;
pub mod query;
pub mod reference;
pub mod serialize;

// Re-export BSON types for convenience (and for `string_enum!` expansion).
pub use bson;
