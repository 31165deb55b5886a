//! Core Store implementation

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::clock::ServerClock;
use crate::document::{Change, ChangeKind, Document};
use crate::error::StoreError;
use crate::filter::{Filter, Precondition, matches_all};
use crate::record::{IndexValue, Record};

/// A document as held inside a collection
#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    /// Insertion sequence within the collection
    seq: u64,
    version: u64,
    created_at: i64,
    updated_at: i64,
    body: serde_json::Value,
    index: HashMap<String, IndexValue>,
}

impl StoredDoc {
    fn decode<T: Record>(&self) -> Result<Document<T>, StoreError> {
        Ok(Document {
            id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            data: serde_json::from_value(self.body.clone())?,
        })
    }
}

#[derive(Debug, Default)]
struct Collection {
    docs: HashMap<String, StoredDoc>,
    next_seq: u64,
}

impl Collection {
    /// Documents matching the filters, in insertion order
    fn select(&self, filters: &[Filter]) -> Vec<&StoredDoc> {
        let mut docs: Vec<&StoredDoc> = self
            .docs
            .values()
            .filter(|d| matches_all(filters, &d.index))
            .collect();
        docs.sort_by_key(|d| d.seq);
        docs
    }
}

/// In-memory document store
///
/// Every write is applied atomically with respect to other calls because the
/// store is only reachable through `&mut self`.
#[derive(Debug, Default)]
pub struct Store {
    collections: HashMap<String, Collection>,
    clock: ServerClock,
    changes: Vec<Change>,
}

impl Store {
    pub fn new() -> Self {
        debug!("Store::new: called");
        Self::default()
    }

    fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }

    /// Insert a record, assigning id, version and server timestamp
    pub fn insert<T: Record>(&mut self, record: T) -> Result<Document<T>, StoreError> {
        let collection = T::collection_name();
        let body = serde_json::to_value(&record)?;
        let index = record.indexed_fields();
        let id = Uuid::now_v7().to_string();
        let ts = self.clock.tick();
        debug!(%collection, %id, ts, "Store::insert: called");

        let coll = self.collection_mut(collection);
        let seq = coll.next_seq;
        coll.next_seq += 1;
        coll.docs.insert(
            id.clone(),
            StoredDoc {
                id: id.clone(),
                seq,
                version: 1,
                created_at: ts,
                updated_at: ts,
                body,
                index: index.clone(),
            },
        );

        self.changes.push(Change {
            collection: collection.to_string(),
            id: id.clone(),
            kind: ChangeKind::Added,
            before: None,
            after: Some(index),
            at: ts,
        });

        Ok(Document {
            id,
            version: 1,
            created_at: ts,
            updated_at: ts,
            data: record,
        })
    }

    /// Insert a record unless one matching `filters` already exists
    ///
    /// The existence check and the insert are one step, so at most one of
    /// several competing inserts succeeds.
    pub fn insert_unique<T: Record>(&mut self, record: T, filters: &[Filter]) -> Result<Document<T>, StoreError> {
        let collection = T::collection_name();
        debug!(%collection, filter_count = filters.len(), "Store::insert_unique: called");
        let existing = self
            .collection(collection)
            .and_then(|c| c.select(filters).first().map(|d| d.id.clone()));
        if let Some(id) = existing {
            debug!(%collection, %id, "Store::insert_unique: matching document exists");
            return Err(StoreError::PreconditionFailed {
                collection: collection.to_string(),
                id,
                reason: "a matching document already exists".to_string(),
            });
        }
        self.insert(record)
    }

    /// Get a record by id
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<Document<T>>, StoreError> {
        debug!(collection = T::collection_name(), %id, "Store::get: called");
        self.collection(T::collection_name())
            .and_then(|c| c.docs.get(id))
            .map(|d| d.decode())
            .transpose()
    }

    /// All records matching every filter, in insertion order
    pub fn query<T: Record>(&self, filters: &[Filter]) -> Result<Vec<Document<T>>, StoreError> {
        debug!(collection = T::collection_name(), filter_count = filters.len(), "Store::query: called");
        match self.collection(T::collection_name()) {
            Some(coll) => coll.select(filters).into_iter().map(|d| d.decode()).collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Replace a record's body if the precondition holds
    ///
    /// The check and the write happen in one step; on failure nothing changes.
    pub fn update<T: Record>(
        &mut self,
        id: &str,
        record: T,
        precondition: &Precondition,
    ) -> Result<Document<T>, StoreError> {
        let collection = T::collection_name();
        debug!(%collection, %id, ?precondition, "Store::update: called");

        let current = self
            .collection(collection)
            .and_then(|c| c.docs.get(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Err(reason) = precondition.check(current.version, &current.index) {
            debug!(%collection, %id, %reason, "Store::update: precondition failed");
            return Err(StoreError::PreconditionFailed {
                collection: collection.to_string(),
                id: id.to_string(),
                reason,
            });
        }

        let body = serde_json::to_value(&record)?;
        let index = record.indexed_fields();
        let ts = self.clock.tick();

        let coll = self.collection_mut(collection);
        let doc = coll.docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        let before = std::mem::replace(&mut doc.index, index.clone());
        doc.body = body;
        doc.version += 1;
        doc.updated_at = ts;
        let (version, created_at) = (doc.version, doc.created_at);

        self.changes.push(Change {
            collection: collection.to_string(),
            id: id.to_string(),
            kind: ChangeKind::Modified,
            before: Some(before),
            after: Some(index),
            at: ts,
        });

        Ok(Document {
            id: id.to_string(),
            version,
            created_at,
            updated_at: ts,
            data: record,
        })
    }

    /// Delete a record by id; returns false if it did not exist
    pub fn delete<T: Record>(&mut self, id: &str) -> bool {
        let collection = T::collection_name();
        debug!(%collection, %id, "Store::delete: called");
        let removed = self.collection_mut(collection).docs.remove(id);
        match removed {
            Some(doc) => {
                let ts = self.clock.tick();
                self.changes.push(Change {
                    collection: collection.to_string(),
                    id: doc.id,
                    kind: ChangeKind::Removed,
                    before: Some(doc.index),
                    after: None,
                    at: ts,
                });
                true
            }
            None => {
                debug!(%collection, %id, "Store::delete: no such document");
                false
            }
        }
    }

    /// Delete a record only if the precondition holds
    ///
    /// Returns Ok(false) if the record does not exist.
    pub fn delete_if<T: Record>(&mut self, id: &str, precondition: &Precondition) -> Result<bool, StoreError> {
        let collection = T::collection_name();
        debug!(%collection, %id, ?precondition, "Store::delete_if: called");
        let Some(current) = self.collection(collection).and_then(|c| c.docs.get(id)) else {
            return Ok(false);
        };
        if let Err(reason) = precondition.check(current.version, &current.index) {
            debug!(%collection, %id, %reason, "Store::delete_if: precondition failed");
            return Err(StoreError::PreconditionFailed {
                collection: collection.to_string(),
                id: id.to_string(),
                reason,
            });
        }
        Ok(self.delete::<T>(id))
    }

    /// Delete every record matching the filters; returns how many were removed
    pub fn delete_where<T: Record>(&mut self, filters: &[Filter]) -> usize {
        let ids: Vec<String> = self
            .collection(T::collection_name())
            .map(|c| c.select(filters).into_iter().map(|d| d.id.clone()).collect())
            .unwrap_or_default();
        debug!(collection = T::collection_name(), count = ids.len(), "Store::delete_where: called");
        ids.iter().filter(|id| self.delete::<T>(id)).count()
    }

    /// Take all changes recorded since the last drain, oldest first
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }
}
