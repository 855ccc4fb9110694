//! Main entitylayer crate providing a typed entity mapping layer over
//! schemaless document stores.
//!
//! This crate is the primary entry point for users of the entitylayer
//! framework. It re-exports the core types from the sub-crates and
//! provides convenient access to the bundled in-memory backend.
//!
//! # Features
//!
//! - **One live instance per identity** - the identity pool guarantees two
//!   queries for the same stored entity hand back the same in-memory
//!   handle
//! - **Dirty checking** - unchanged entities are never rewritten; `save`
//!   compares content hashes and skips redundant writes
//! - **Lazy references** - entity-valued fields store identity-based
//!   descriptors and resolve on demand, so shared and cyclic references
//!   stay safe
//! - **Typed queries** - field keys carry their value type, so field-name
//!   typos and type-mismatched comparisons fail to compile
//!
//! # Quick Start
//!
//! ```ignore
//! use entitylayer::{prelude::*, memory::MemoryBackend};
//! use bson::oid::ObjectId;
//!
//! struct Breed {
//!     id: ObjectId,
//!     name: String,
//! }
//!
//! struct BreedValues {
//!     name: Option<String>,
//! }
//!
//! struct BreedFields {
//!     path: KeyPath,
//! }
//!
//! impl BreedFields {
//!     fn name(&self) -> Key<String> {
//!         self.path.key("name")
//!     }
//! }
//!
//! impl ModelFields for BreedFields {
//!     fn scoped(path: KeyPath) -> Self {
//!         BreedFields { path }
//!     }
//! }
//!
//! impl ModelValues for BreedValues {
//!     fn deserialize(document: &Document) -> MappingResult<Self> {
//!         let reader = DocumentReader::new(document);
//!         Ok(BreedValues { name: reader.read_optional(&Breed::NAME)? })
//!     }
//! }
//!
//! impl Breed {
//!     const NAME: Key<String> = Key::new("name");
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
//!     fn id(&self) -> ObjectId {
//!         self.id
//!     }
//!
//!     fn serialize(&self) -> Document {
//!         let mut writer = DocumentWriter::new();
//!         writer.write(&Self::NAME, &self.name);
//!         writer.finish()
//!     }
//!
//!     fn deserialize(document: &Document) -> MappingResult<Self> {
//!         let reader = DocumentReader::new(document);
//!         Ok(Breed {
//!             id: reader.read(&IDENTITY_KEY)?,
//!             name: reader.read(&Self::NAME)?,
//!         })
//!     }
//!
//!     fn apply(&mut self, values: Self::Values) {
//!         if let Some(name) = values.name {
//!             self.name = name;
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = Context::new(MemoryBackend::new());
//!     let breeds = context.collection::<Breed>();
//!
//!     // Save an entity; a second save with no changes skips the write.
//!     let siamese = Entity::new(Breed { id: ObjectId::new(), name: "Siamese".into() });
//!     breeds.save(&siamese).await.unwrap();
//!     assert!(!breeds.save(&siamese).await.unwrap().was_updated());
//!
//!     // Typed query; the result is the same live instance.
//!     let found = breeds
//!         .find_one_with(|breed| breed.name().eq("Siamese"))
//!         .await
//!         .unwrap()
//!         .unwrap();
//!     assert!(Entity::ptr_eq(&siamese, &found));
//! }
//! ```

pub use entitylayer_core::{
    backend, context, entity, error, key, pool, primitive, query, reference, serialize,
    string_enum,
};

// Re-export BSON types for convenience
pub use bson;

pub mod prelude;

/// In-memory backend implementation.
pub mod memory {
    pub use entitylayer_memory::MemoryBackend;
}
