use std::sync::Arc;

use anyhow::Error;
use bookstore_core::{
    book::DATABASE_NAME,
    database::{
        find_many_options::FindManyOptions, index::IndexSpec, pipeline::Pipeline, query::Query,
        update::Update, MemoryDatabase, UpdateOutcome,
    },
};
use bson::Document;
use log::*;
use tokio::sync::RwLock;

use super::{BookStore, Connect};

/// A handle on one collection of a shared [`MemoryDatabase`]. Clones share the data, so a
/// handle kept by the caller observes everything a run did.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    db: Arc<RwLock<MemoryDatabase>>,
    collection: String,
}

impl MemoryStore {
    pub fn new(collection: &str) -> Self {
        Self::with_database(MemoryDatabase::new(DATABASE_NAME), collection)
    }

    pub fn with_database(database: MemoryDatabase, collection: &str) -> Self {
        debug!("Creating new MemoryStore for {}", collection);
        MemoryStore {
            db: Arc::new(RwLock::new(database)),
            collection: collection.to_string(),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub async fn count(&self) -> usize {
        self.db.read().await.count(&self.collection)
    }

    pub async fn list_indexes(&self) -> Vec<String> {
        self.db.read().await.list_indexes(&self.collection)
    }
}

impl Connect for MemoryStore {
    type Store = MemoryStore;

    fn backend(&self) -> &str {
        "in-memory engine"
    }

    async fn connect(&self) -> Result<MemoryStore, Error> {
        Ok(self.clone())
    }
}

impl BookStore for MemoryStore {
    async fn find_many(
        &self,
        query: &Query,
        find_many_options: Option<FindManyOptions>,
    ) -> Result<Vec<Document>, Error> {
        debug!("Finding many");
        let db = self.db.read().await;
        let values = db.find_many(&self.collection, query, find_many_options)?;
        trace!("Found values: {:?}", values);
        Ok(values)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64, Error> {
        debug!("Inserting many");
        let mut db = self.db.write().await;
        let ids = db.insert_many(&self.collection, documents)?;
        Ok(ids.len() as u64)
    }

    async fn update_one(&self, query: &Query, update: &Update) -> Result<UpdateOutcome, Error> {
        debug!("Updating one");
        let mut db = self.db.write().await;
        db.update_one(&self.collection, query, update)
    }

    async fn delete_one(&self, query: &Query) -> Result<u64, Error> {
        debug!("Deleting one");
        let mut db = self.db.write().await;
        db.delete_one(&self.collection, query)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, Error> {
        debug!("Aggregating");
        let db = self.db.read().await;
        let values = db.aggregate(&self.collection, pipeline)?;
        trace!("Aggregated values: {:?}", values);
        Ok(values)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String, Error> {
        debug!("Creating index {}", index.resolved_name());
        let mut db = self.db.write().await;
        db.create_index(&self.collection, index.clone())
    }

    async fn explain(&self, query: &Query) -> Result<Document, Error> {
        debug!("Explaining find");
        let db = self.db.read().await;
        db.explain(&self.collection, query)
    }

    async fn close(self) {
        debug!("Releasing MemoryStore handle");
    }
}
