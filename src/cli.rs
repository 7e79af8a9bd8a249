use std::path::PathBuf;

use clap::Parser;

use crate::environment::Engine;

/// Run the bookstore query walkthrough against a document database.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Cli {
    /// Connection string, overrides MONGODB_URI
    #[arg(long, short)]
    pub uri: Option<String>,
    /// Database name, overrides BOOKSTORE_DATABASE
    #[arg(long, short)]
    pub database: Option<String>,
    /// Collection name, overrides BOOKSTORE_COLLECTION
    #[arg(long, short)]
    pub collection: Option<String>,
    /// Where the queries run
    #[arg(long, short, value_enum)]
    pub engine: Option<Engine>,
    /// JSON array of books inserted before the first query
    #[arg(long, short)]
    pub seed: Option<PathBuf>,
}
