use anyhow::Error;
use bookstore::{
    cli::Cli, Engine, Environment, Fixture, MemoryDatabase, MemoryStore, MongoConnector, Runner,
};
use clap::Parser;
use log::*;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let cli = Cli::parse();
    let environment = Environment::load(&cli)?;
    let seed = environment
        .seed
        .as_deref()
        .map(Fixture::load)
        .transpose()?;

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let report = match environment.engine {
        Engine::Mongo => {
            Runner::new(MongoConnector::new(&environment))
                .with_seed(seed)
                .run(&mut stdout, &mut stderr)
                .await?
        }
        Engine::Memory => {
            if seed.is_none() {
                warn!("The in-memory engine starts empty, pass --seed to load books");
            }
            let database = MemoryDatabase::new(&environment.database);
            Runner::new(MemoryStore::with_database(database, &environment.collection))
                .with_seed(seed)
                .run(&mut stdout, &mut stderr)
                .await?
        }
    };
    debug!("Completed steps: {:?}", report.steps());

    Ok(())
}
