use anyhow::Error;
use bookstore_core::database::{
    find_many_options::FindManyOptions, index::IndexSpec, pipeline::Pipeline, query::Query,
    update::Update, UpdateOutcome,
};
use bson::Document;

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::{MongoConnector, MongoStore};

/// The collection operations the runner issues. Every call is awaited before the
/// next one is made, so implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait BookStore {
    async fn find_many(
        &self,
        query: &Query,
        find_many_options: Option<FindManyOptions>,
    ) -> Result<Vec<Document>, Error>;

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64, Error>;

    async fn update_one(&self, query: &Query, update: &Update) -> Result<UpdateOutcome, Error>;

    async fn delete_one(&self, query: &Query) -> Result<u64, Error>;

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, Error>;

    /// Returns the name of the created (or already existing) index.
    async fn create_index(&self, index: &IndexSpec) -> Result<String, Error>;

    /// The raw explain output of a find with `executionStats` verbosity.
    async fn explain(&self, query: &Query) -> Result<Document, Error>;

    /// Release the connection. Called exactly once, on success and failure alike.
    async fn close(self);
}

/// Acquires a store. Kept apart from [`BookStore`] so a failed connection still has a
/// place in the run sequence.
#[allow(async_fn_in_trait)]
pub trait Connect {
    type Store: BookStore;

    /// Human readable name of the backend, used in the report.
    fn backend(&self) -> &str;

    async fn connect(&self) -> Result<Self::Store, Error>;
}
