use std::path::Path;

use anyhow::{Context, Error};
use bson::Document;
use serde::{Deserialize, Serialize};

pub const DATABASE_NAME: &str = "plp_bookstore";
pub const COLLECTION_NAME: &str = "books";

/// A book as stored in the `books` collection.
///
/// The runner never enforces this shape on the server, it only assumes it. The
/// type exists so fixtures and seed files can be written and validated in Rust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
}

impl Book {
    /// Create a new book.
    /// # Example
    /// ```rust
    /// use bookstore_core::book::Book;
    /// let book = Book::new("Clean Code", "Robert C. Martin", "Programming", 2008, 35.0, true);
    /// assert_eq!(book.published_year, 2008);
    /// ```
    pub fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i32,
        price: f64,
        in_stock: bool,
    ) -> Self {
        Book {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
        }
    }

    pub fn to_document(&self) -> Result<Document, Error> {
        Ok(bson::to_document(self)?)
    }
}

/// A set of books loaded from a JSON array, used to seed a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fixture {
    pub books: Vec<Book>,
}

impl Fixture {
    pub fn new(books: Vec<Book>) -> Self {
        Fixture { books }
    }

    /// Parse a fixture from a JSON array of books.
    ///
    /// ```
    /// use bookstore_core::book::Fixture;
    /// let fixture = Fixture::from_json(r#"[{
    ///     "title": "Dune", "author": "Frank Herbert", "genre": "Science Fiction",
    ///     "published_year": 1965, "price": 9.99, "in_stock": true
    /// }]"#).unwrap();
    /// assert_eq!(fixture.books.len(), 1);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let books: Vec<Book> = serde_json::from_str(json)?;
        Ok(Fixture { books })
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid seed file {}", path.display()))
    }

    pub fn documents(&self) -> Result<Vec<Document>, Error> {
        self.books.iter().map(Book::to_document).collect()
    }
}
