pub mod cli;
pub mod environment;
pub mod error;
pub mod queries;
pub mod report;
pub mod runner;
pub mod store;

pub use bookstore_core::{
    book::{Book, Fixture},
    database::{
        find_many_options::{FindManyOptions, FindManyOrder, OrderDirection, Projection},
        index::IndexSpec,
        pipeline::{Accumulator, GroupKey, Pipeline, ProjectField, Stage},
        query::Query,
        update::Update,
        MemoryDatabase, UpdateOutcome,
    },
};

pub use crate::{
    environment::{Engine, Environment},
    error::RunnerError,
    runner::{Outcome, RunReport, Runner, Step},
    store::{BookStore, Connect, MemoryStore, MongoConnector, MongoStore},
};
