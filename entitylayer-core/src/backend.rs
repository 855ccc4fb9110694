//! The collection collaborator consumed by the mapping layer.
//!
//! This module defines the boundary to the underlying document store. The
//! core never talks to a wire protocol itself; it issues inserts, queries,
//! replacements and removals over raw documents through
//! [`CollectionBackend`] and leaves connection management, cancellation
//! and timeouts to the implementation.
//!
//! Implementations must be thread-safe (`Send + Sync`): a single logical
//! backend is shared across arbitrarily many concurrent callers, and every
//! operation is potentially blocking I/O.

use async_trait::async_trait;
use bson::Document;
use bson::oid::ObjectId;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::error::MappingResult;
use crate::query::Query;

/// A lazily-driven sequence of raw documents produced by a find.
pub type DocumentStream = BoxStream<'static, MappingResult<Document>>;

/// Outcome of a query-keyed update/replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents the query matched.
    pub matched: u64,
    /// Number of documents actually rewritten.
    pub modified: u64,
    /// Identity of a newly upserted document, when the update inserted.
    pub upserted: Option<ObjectId>,
}

/// Outcome of a query-keyed removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Number of documents removed.
    pub removed: u64,
}

/// Abstract interface to one document store holding named collections.
///
/// All operations are keyed by [`Query`] expressions; the backend owns
/// their translation to whatever its native query surface is (see
/// [`crate::query::QueryVisitor`]).
#[async_trait]
pub trait CollectionBackend: Send + Sync + Debug {
    /// Inserts a raw document into a collection.
    ///
    /// The collection is created implicitly if it does not exist.
    async fn insert(&self, collection: &str, document: Document) -> MappingResult<()>;

    /// Returns the first document matching the query, if any.
    async fn find_one(&self, collection: &str, query: Query) -> MappingResult<Option<Document>>;

    /// Returns a lazy stream of all documents matching the query.
    ///
    /// Sort, skip, limit and the batch-size hint are taken from the query.
    async fn find(&self, collection: &str, query: Query) -> MappingResult<DocumentStream>;

    /// Counts the documents matching the query, honoring skip and limit.
    async fn count(&self, collection: &str, query: Query) -> MappingResult<u64>;

    /// Replaces the first document matching the query with the given
    /// document, inserting it when `upsert` is true and nothing matched.
    ///
    /// Replaying the same replacement is a no-op at the storage layer.
    async fn update(
        &self,
        collection: &str,
        query: Query,
        replacement: Document,
        upsert: bool,
    ) -> MappingResult<UpdateOutcome>;

    /// Removes every document matching the query.
    async fn remove(&self, collection: &str, query: Query) -> MappingResult<RemoveOutcome>;
}
