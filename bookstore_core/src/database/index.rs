use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use super::find_many_options::OrderDirection;

#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: OrderDirection,
}

/// An index definition: an ordered list of keyed fields and an optional explicit name.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: Option<String>,
    pub keys: Vec<IndexKey>,
}

impl IndexSpec {
    /// Start an index definition with a single ascending key.
    ///
    /// ```
    /// use bookstore_core::database::index::IndexSpec;
    /// let index = IndexSpec::ascending("author").then_descending("published_year");
    /// assert_eq!(index.resolved_name(), "author_1_published_year_-1");
    /// ```
    pub fn ascending(field: &str) -> Self {
        IndexSpec {
            name: None,
            keys: vec![IndexKey {
                field: field.to_string(),
                direction: OrderDirection::Ascending,
            }],
        }
    }

    pub fn descending(field: &str) -> Self {
        IndexSpec {
            name: None,
            keys: vec![IndexKey {
                field: field.to_string(),
                direction: OrderDirection::Descending,
            }],
        }
    }

    pub fn then_ascending(mut self, field: &str) -> Self {
        self.keys.push(IndexKey {
            field: field.to_string(),
            direction: OrderDirection::Ascending,
        });
        self
    }

    pub fn then_descending(mut self, field: &str) -> Self {
        self.keys.push(IndexKey {
            field: field.to_string(),
            direction: OrderDirection::Descending,
        });
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
            .collect()
    }

    /// The name the server generates when none is given: `<field>_<direction>` pairs
    /// joined with underscores.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn resolved_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.default_name())
    }

    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys
    }
}
