use anyhow::anyhow;
use bson::{Bson, Document, doc, oid::ObjectId};
use find_many_options::FindManyOptions;
use index::IndexSpec;
use log::*;
use pipeline::{Pipeline, sort_documents};
use query::{Query, values_equal};
use std::collections::HashMap;
use std::time::Instant;
use update::Update;

pub mod find_many_options;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod update;

pub type DbResult<T> = Result<T, anyhow::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Documents of one collection in natural (insertion) order, plus its index catalog.
#[derive(Debug, Clone)]
pub struct CollectionData {
    pub documents: Vec<Document>,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionData {
    fn new() -> Self {
        CollectionData {
            documents: Vec::new(),
            indexes: vec![IndexSpec::ascending("_id").named("_id_")],
        }
    }
}

/// An embedded database holding named collections in memory.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    name: String,
    collections: HashMap<String, CollectionData>,
}

impl MemoryDatabase {
    pub fn new(name: &str) -> Self {
        debug!("Creating in-memory database {}", name);
        MemoryDatabase {
            name: name.to_string(),
            collections: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name)
    }

    // Collections spring into existence on first write.
    fn collection_mut(&mut self, name: &str) -> &mut CollectionData {
        self.collections
            .entry(name.to_string())
            .or_insert_with(CollectionData::new)
    }

    fn documents(&self, collection: &str) -> &[Document] {
        self.collection(collection)
            .map(|data| data.documents.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, collection: &str) -> usize {
        self.documents(collection).len()
    }

    // Operations
    pub fn insert_many(
        &mut self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DbResult<Vec<Bson>> {
        let namespace = format!("{}.{}", self.name, collection);
        let data = self.collection_mut(collection);

        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let document = if document.contains_key("_id") {
                document
            } else {
                let mut with_id = doc! { "_id": ObjectId::new() };
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                with_id
            };
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            let taken = data
                .documents
                .iter()
                .chain(prepared.iter())
                .any(|existing: &Document| existing.get("_id").is_some_and(|e| values_equal(e, &id)));
            if taken {
                return Err(anyhow!(
                    "E11000 duplicate key error collection: {} index: _id_ dup key: {{ _id: {} }}",
                    namespace,
                    id
                ));
            }
            prepared.push(document);
        }

        let ids: Vec<Bson> = prepared
            .iter()
            .filter_map(|document| document.get("_id").cloned())
            .collect();
        data.documents.extend(prepared);
        trace!("Inserted ids: {:?}", ids);
        Ok(ids)
    }

    pub fn find_many(
        &self,
        collection: &str,
        query: &Query,
        find_many_options: Option<FindManyOptions>,
    ) -> DbResult<Vec<Document>> {
        let FindManyOptions {
            skip,
            limit,
            order,
            projection,
        } = find_many_options.unwrap_or_default();

        let mut results: Vec<Document> = self
            .documents(collection)
            .iter()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();

        if let Some(order) = order {
            sort_documents(&mut results, &order);
        }
        let paginated = apply_skip_limit(results, skip, limit);

        Ok(match projection {
            Some(projection) => paginated.iter().map(|d| projection.apply(d)).collect(),
            None => paginated,
        })
    }

    pub fn update_one(
        &mut self,
        collection: &str,
        query: &Query,
        update: &Update,
    ) -> DbResult<UpdateOutcome> {
        let Update::Set(fields) = update;
        for key in fields.keys() {
            if key == "_id" {
                return Err(anyhow!(
                    "Performing an update on the path '_id' would modify the immutable field '_id'"
                ));
            }
            if key.is_empty() || key.starts_with('$') || key.contains('.') {
                return Err(anyhow!("Unsupported field path in $set: '{}'", key));
            }
        }

        let Some(data) = self.collections.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(document) = data.documents.iter_mut().find(|d| query.matches(d)) else {
            return Ok(UpdateOutcome::default());
        };

        let mut modified = false;
        for (key, value) in fields {
            if document.get(key) != Some(value) {
                document.insert(key.clone(), value.clone());
                modified = true;
            }
        }
        Ok(UpdateOutcome {
            matched: 1,
            modified: modified as u64,
        })
    }

    pub fn delete_one(&mut self, collection: &str, query: &Query) -> DbResult<u64> {
        let Some(data) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        match data.documents.iter().position(|d| query.matches(d)) {
            Some(position) => {
                let removed = data.documents.remove(position);
                trace!("Deleted value: {:?}", removed);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> DbResult<Vec<Document>> {
        pipeline.execute(self.documents(collection).to_vec())
    }

    /// Register an index. Re-creating an index with the same key pattern returns the
    /// existing name; reusing a name for a different key pattern is a conflict.
    pub fn create_index(&mut self, collection: &str, index: IndexSpec) -> DbResult<String> {
        if index.keys.is_empty() {
            return Err(anyhow!("Index keys cannot be empty."));
        }
        let name = index.resolved_name();
        let data = self.collection_mut(collection);

        if let Some(existing) = data.indexes.iter().find(|i| i.same_keys(&index)) {
            let existing_name = existing.resolved_name();
            if index.name.is_none() || existing_name == name {
                return Ok(existing_name);
            }
            return Err(anyhow!(
                "Index already exists with a different name: {}",
                existing_name
            ));
        }
        if data.indexes.iter().any(|i| i.resolved_name() == name) {
            return Err(anyhow!(
                "An existing index has the same name as the requested index but different keys: {}",
                name
            ));
        }

        data.indexes.push(index.named(&name));
        Ok(name)
    }

    pub fn list_indexes(&self, collection: &str) -> Vec<String> {
        self.collection(collection)
            .map(|data| data.indexes.iter().map(IndexSpec::resolved_name).collect())
            .unwrap_or_default()
    }

    /// Execution statistics for a find, in the shape of the server's `executionStats`
    /// explain verbosity. Finds never consult the index catalog, so the plan is always a
    /// collection scan.
    pub fn explain(&self, collection: &str, query: &Query) -> DbResult<Document> {
        let started = Instant::now();
        let documents = self.documents(collection);
        let returned = documents.iter().filter(|d| query.matches(d)).count();
        let elapsed = started.elapsed().as_millis() as i64;

        Ok(doc! {
            "queryPlanner": {
                "namespace": format!("{}.{}", self.name, collection),
                "parsedQuery": query.to_document(),
                "winningPlan": {
                    "stage": "COLLSCAN",
                    "filter": query.to_document(),
                    "direction": "forward",
                },
            },
            "executionStats": {
                "executionSuccess": true,
                "nReturned": returned as i64,
                "executionTimeMillis": elapsed,
                "totalKeysExamined": 0_i64,
                "totalDocsExamined": documents.len() as i64,
            },
        })
    }
}

// A limit of zero means no limit; a negative limit is treated as its absolute value.
fn apply_skip_limit(data: Vec<Document>, skip: Option<u64>, limit: Option<i64>) -> Vec<Document> {
    let skip = skip.unwrap_or(0) as usize;
    let limit = limit
        .filter(|limit| *limit != 0)
        .map(|limit| limit.unsigned_abs() as usize)
        .unwrap_or(usize::MAX);
    data.into_iter().skip(skip).take(limit).collect()
}
