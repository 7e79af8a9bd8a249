pub mod book;
pub mod database;
