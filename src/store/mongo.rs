use anyhow::Error;
use bookstore_core::database::{
    find_many_options::FindManyOptions, index::IndexSpec, pipeline::Pipeline, query::Query,
    update::Update, UpdateOutcome,
};
use bson::{doc, Document};
use futures_util::TryStreamExt;
use log::*;
use mongodb::{options::IndexOptions, Client, Collection, Database, IndexModel};

use super::{BookStore, Connect};
use crate::environment::Environment;

/// Connects to a MongoDB deployment through the official driver.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    uri: String,
    database: String,
    collection: String,
}

impl MongoConnector {
    pub fn new(environment: &Environment) -> Self {
        MongoConnector {
            uri: environment.uri.clone(),
            database: environment.database.clone(),
            collection: environment.collection.clone(),
        }
    }
}

impl Connect for MongoConnector {
    type Store = MongoStore;

    fn backend(&self) -> &str {
        "MongoDB"
    }

    async fn connect(&self) -> Result<MongoStore, Error> {
        debug!("Connecting to {}/{}", self.database, self.collection);
        let client = Client::with_uri_str(&self.uri).await?;
        let database = client.database(&self.database);

        // Creating a client does not touch the network, a ping does.
        if let Err(err) = database.run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(err.into());
        }

        let collection = database.collection::<Document>(&self.collection);
        Ok(MongoStore {
            client,
            database,
            collection,
        })
    }
}

pub struct MongoStore {
    client: Client,
    database: Database,
    collection: Collection<Document>,
}

impl BookStore for MongoStore {
    async fn find_many(
        &self,
        query: &Query,
        find_many_options: Option<FindManyOptions>,
    ) -> Result<Vec<Document>, Error> {
        debug!("Finding many");
        let options = find_many_options.unwrap_or_default();
        let mut find = self.collection.find(query.to_document());
        if let Some(sort) = options.sort_document() {
            find = find.sort(sort);
        }
        if let Some(skip) = options.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = options.limit {
            find = find.limit(limit);
        }
        if let Some(projection) = &options.projection {
            find = find.projection(projection.to_document());
        }
        let documents: Vec<Document> = find.await?.try_collect().await?;
        trace!("Found values: {:?}", documents);
        Ok(documents)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64, Error> {
        debug!("Inserting many");
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.collection.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_one(&self, query: &Query, update: &Update) -> Result<UpdateOutcome, Error> {
        debug!("Updating one");
        let result = self
            .collection
            .update_one(query.to_document(), update.to_document())
            .await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, query: &Query) -> Result<u64, Error> {
        debug!("Deleting one");
        let result = self.collection.delete_one(query.to_document()).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, Error> {
        debug!("Aggregating");
        let documents: Vec<Document> = self
            .collection
            .aggregate(pipeline.to_documents())
            .await?
            .try_collect()
            .await?;
        trace!("Aggregated values: {:?}", documents);
        Ok(documents)
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String, Error> {
        debug!("Creating index {}", index.resolved_name());
        let options = index
            .name
            .as_ref()
            .map(|name| IndexOptions::builder().name(name.clone()).build());
        let model = IndexModel::builder()
            .keys(index.keys_document())
            .options(options)
            .build();
        let result = self.collection.create_index(model).await?;
        Ok(result.index_name)
    }

    async fn explain(&self, query: &Query) -> Result<Document, Error> {
        debug!("Explaining find");
        let command = doc! {
            "explain": {
                "find": self.collection.name(),
                "filter": query.to_document(),
            },
            "verbosity": "executionStats",
        };
        Ok(self.database.run_command(command).await?)
    }

    async fn close(self) {
        debug!("Closing MongoDB client");
        self.client.shutdown().await;
    }
}
