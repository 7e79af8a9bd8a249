use bson::{Document, doc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Update {
    /// Assign each field of the document, the `$set` operator.
    Set(Document),
}

impl Update {
    pub fn set(fields: Document) -> Self {
        Self::Set(fields)
    }

    /// ```
    /// use bookstore_core::database::update::Update;
    /// use bson::doc;
    /// let update = Update::set(doc! { "price": 29.99 });
    /// assert_eq!(update.to_document(), doc! { "$set": { "price": 29.99 } });
    /// ```
    pub fn to_document(&self) -> Document {
        match self {
            Self::Set(fields) => doc! { "$set": fields.clone() },
        }
    }
}
