//! In-memory collection backend.
//!
//! This module provides a simple but complete [`CollectionBackend`] that
//! keeps raw documents in HashMaps behind async-aware read-write locks.
//! It is the reference implementation of the collection collaborator and
//! the backend the test suites run against.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;

use entitylayer_core::{
    backend::{CollectionBackend, DocumentStream, RemoveOutcome, UpdateOutcome},
    error::{MappingError, MappingResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup_path};

type CollectionMap = HashMap<ObjectId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage.
///
/// Cloneable; all clones share the same underlying collections. Queries
/// scan every document in a collection (no indexing), which is fine for
/// the datasets this backend is meant for: tests and small tools.
///
/// The `batch_size` hint on queries is ignored; results are materialized
/// before the stream is returned, so driving a find stream never holds a
/// store lock.
#[derive(Default, Clone, Debug)]
pub struct MemoryBackend {
    store: Arc<RwLock<StoreMap>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    fn document_id(document: &Document) -> MappingResult<ObjectId> {
        document
            .get_object_id("_id")
            .map_err(|_| MappingError::Backend("document is missing an `_id` field".to_string()))
    }

    /// Applies filter, sort, skip and limit to one collection's documents.
    fn select(collection: &CollectionMap, query: &Query) -> Vec<Document> {
        let mut selected: Vec<Document> = collection
            .values()
            .filter(|doc| match &query.filter {
                Some(filter) => DocumentEvaluator::matches(doc, filter),
                None => true,
            })
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            selected.sort_by(|a, b| {
                let left = lookup_path(a, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup_path(b, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        selected
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[async_trait]
impl CollectionBackend for MemoryBackend {
    async fn insert(&self, collection: &str, document: Document) -> MappingResult<()> {
        let id = Self::document_id(&document)?;

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id, document);

        Ok(())
    }

    async fn find_one(&self, collection: &str, query: Query) -> MappingResult<Option<Document>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        Ok(Self::select(collection_map, &query).into_iter().next())
    }

    async fn find(&self, collection: &str, query: Query) -> MappingResult<DocumentStream> {
        let store = self.store.read().await;
        let selected = match store.get(collection) {
            Some(col) => Self::select(col, &query),
            None => Vec::new(),
        };

        Ok(stream::iter(selected.into_iter().map(Ok)).boxed())
    }

    async fn count(&self, collection: &str, query: Query) -> MappingResult<u64> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        Ok(Self::select(collection_map, &query).len() as u64)
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        replacement: Document,
        upsert: bool,
    ) -> MappingResult<UpdateOutcome> {
        let replacement_id = Self::document_id(&replacement)?;
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        let matched = collection_map
            .iter()
            .find(|(_, doc)| match &query.filter {
                Some(filter) => DocumentEvaluator::matches(doc, filter),
                None => true,
            })
            .map(|(id, doc)| (*id, doc.clone()));

        match matched {
            Some((existing_id, existing)) => {
                // Replaying an identical replacement is a no-op.
                if existing == replacement {
                    return Ok(UpdateOutcome { matched: 1, modified: 0, upserted: None });
                }

                collection_map.remove(&existing_id);
                collection_map.insert(replacement_id, replacement);

                Ok(UpdateOutcome { matched: 1, modified: 1, upserted: None })
            }
            None if upsert => {
                collection_map.insert(replacement_id, replacement);

                Ok(UpdateOutcome {
                    matched: 0,
                    modified: 0,
                    upserted: Some(replacement_id),
                })
            }
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn remove(&self, collection: &str, query: Query) -> MappingResult<RemoveOutcome> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(RemoveOutcome::default()),
        };

        let doomed: Vec<ObjectId> = collection_map
            .iter()
            .filter(|(_, doc)| match &query.filter {
                Some(filter) => DocumentEvaluator::matches(doc, filter),
                None => true,
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            collection_map.remove(id);
        }

        Ok(RemoveOutcome { removed: doomed.len() as u64 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;
    use entitylayer_core::key::{IDENTITY_KEY, Key};

    fn cat(id: ObjectId, name: &str, age: i64) -> Document {
        let mut doc = Document::new();
        doc.insert("name", name);
        doc.insert("age", age);
        doc.insert("_id", id);

        doc
    }

    const NAME: Key<String> = Key::new("name");
    const AGE: Key<i64> = Key::new("age");

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let backend = MemoryBackend::new();
        let id = ObjectId::new();

        let outcome = backend
            .update("cats", IDENTITY_KEY.eq(id).into(), cat(id, "Mia", 1), true)
            .await
            .unwrap();
        assert_eq!(outcome.upserted, Some(id));

        let outcome = backend
            .update("cats", IDENTITY_KEY.eq(id).into(), cat(id, "Mia", 2), true)
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 1);

        assert_eq!(backend.count("cats", Query::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replaying_an_identical_replacement_modifies_nothing() {
        let backend = MemoryBackend::new();
        let id = ObjectId::new();
        let doc = cat(id, "Mia", 1);

        backend.insert("cats", doc.clone()).await.unwrap();
        let outcome = backend
            .update("cats", IDENTITY_KEY.eq(id).into(), doc, true)
            .await
            .unwrap();

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 0);
    }

    #[tokio::test]
    async fn find_applies_sort_skip_and_limit() {
        let backend = MemoryBackend::new();
        for (name, age) in [("Mia", 3), ("Leo", 1), ("Nox", 2)] {
            backend
                .insert("cats", cat(ObjectId::new(), name, age))
                .await
                .unwrap();
        }

        let query = Query::builder()
            .sort(&AGE, SortDirection::Asc)
            .skip(1)
            .limit(1)
            .build();
        let docs: Vec<_> = backend
            .find("cats", query)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(docs.len(), 1);
        let doc = docs[0].as_ref().unwrap();
        assert_eq!(doc.get("name"), Some(&Bson::String("Nox".into())));
    }

    #[tokio::test]
    async fn remove_reports_how_many_documents_went_away() {
        let backend = MemoryBackend::new();
        for (name, age) in [("Mia", 3), ("Leo", 1), ("Nox", 2)] {
            backend
                .insert("cats", cat(ObjectId::new(), name, age))
                .await
                .unwrap();
        }

        let outcome = backend
            .remove("cats", AGE.gte(2).into())
            .await
            .unwrap();
        assert_eq!(outcome.removed, 2);

        assert_eq!(backend.count("cats", Query::all()).await.unwrap(), 1);
        assert_eq!(
            backend
                .count("cats", NAME.eq("Leo").into())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn finding_in_a_missing_collection_yields_nothing() {
        let backend = MemoryBackend::new();

        assert!(
            backend
                .find_one("ghosts", Query::all())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(backend.count("ghosts", Query::all()).await.unwrap(), 0);
    }
}
