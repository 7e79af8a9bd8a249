use std::env;
use std::path::PathBuf;

use bookstore_core::book::{COLLECTION_NAME, DATABASE_NAME};
use clap::ValueEnum;
use log::*;

use crate::cli::Cli;

pub const DEFAULT_URI: &str = "mongodb://127.0.0.1:27017";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Engine {
    /// A MongoDB server reached through the official driver
    #[default]
    Mongo,
    /// The embedded in-memory engine
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub engine: Engine,
    pub seed: Option<PathBuf>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            uri: DEFAULT_URI.to_string(),
            database: DATABASE_NAME.to_string(),
            collection: COLLECTION_NAME.to_string(),
            engine: Engine::Mongo,
            seed: None,
        }
    }
}

impl Environment {
    /// Resolve the configuration from defaults, an optional `.env` file, the process
    /// environment and finally the command line.
    pub fn load(cli: &Cli) -> Result<Self, anyhow::Error> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(err) if err.not_found() => trace!("No .env file found"),
            Err(err) => return Err(err.into()),
        }
        let environment = Self::from_lookup(|key| env::var(key).ok())?;
        Ok(environment.with_cli(cli))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut environment = Environment::default();
        if let Some(uri) = lookup("MONGODB_URI") {
            environment.uri = uri;
        }
        if let Some(database) = lookup("BOOKSTORE_DATABASE") {
            environment.database = database;
        }
        if let Some(collection) = lookup("BOOKSTORE_COLLECTION") {
            environment.collection = collection;
        }
        if let Some(engine) = lookup("BOOKSTORE_ENGINE") {
            environment.engine = Engine::from_str(&engine, true)
                .map_err(|e| anyhow::anyhow!("Invalid BOOKSTORE_ENGINE: {}", e))?;
        }
        Ok(environment)
    }

    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(uri) = &cli.uri {
            self.uri = uri.clone();
        }
        if let Some(database) = &cli.database {
            self.database = database.clone();
        }
        if let Some(collection) = &cli.collection {
            self.collection = collection.clone();
        }
        if let Some(engine) = cli.engine {
            self.engine = engine;
        }
        if let Some(seed) = &cli.seed {
            self.seed = Some(seed.clone());
        }
        self
    }
}
