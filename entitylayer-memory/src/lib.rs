//! In-memory backend for the entitylayer mapping core.
//!
//! Provides [`MemoryBackend`], a complete
//! [`CollectionBackend`](entitylayer_core::backend::CollectionBackend)
//! holding raw documents in process memory. Intended for tests, examples
//! and small tools; production deployments plug a real driver in behind
//! the same trait.

mod evaluator;
mod store;

pub use store::MemoryBackend;
