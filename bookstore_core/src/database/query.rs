use std::cmp::Ordering;

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Query {
    Eq(Key, Bson),
    Ne(Key, Bson),
    Lt(Key, Bson),
    Lte(Key, Bson),
    Gt(Key, Bson),
    Gte(Key, Bson),
    And(Vec<Query>),
    All,
}

impl Query {
    /// Create a new query that matches documents based on exact match.
    ///
    /// ```
    /// use bookstore_core::database::query::Query;
    ///
    /// let query = Query::eq("genre", "Programming");
    /// ```
    pub fn eq<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Eq(key.into(), value.into())
    }

    /// Create a new query that matches documents based on not equal match.
    pub fn ne<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Ne(key.into(), value.into())
    }

    /// Create a new query that matches documents based on less than match.
    pub fn lt<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Lt(key.into(), value.into())
    }

    pub fn lte<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Lte(key.into(), value.into())
    }

    /// Create a new query that matches documents based on greater than match.
    ///
    /// ```
    /// use bookstore_core::database::query::Query;
    /// let query = Query::gt("published_year", 2010);
    /// ```
    pub fn gt<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Gt(key.into(), value.into())
    }

    pub fn gte<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Bson>,
    {
        Self::Gte(key.into(), value.into())
    }

    /// Create a new query that matches documents based on multiple conditions.
    ///
    /// ```
    /// use bookstore_core::database::query::Query;
    ///
    /// let query = Query::and(vec![
    ///    Query::eq("in_stock", true),
    ///    Query::gt("published_year", 2010),
    /// ]);
    /// ```
    pub fn and(queries: Vec<Query>) -> Self {
        Self::And(queries)
    }

    /// Create a new query that matches all documents.
    pub fn all() -> Self {
        Self::All
    }

    /// Render the query as a filter document understood by the server.
    ///
    /// Conjunctions over distinct fields are flattened into a single document,
    /// the implicit AND form. Anything else falls back to `$and`.
    ///
    /// ```
    /// use bookstore_core::database::query::Query;
    /// use bson::doc;
    /// let query = Query::and(vec![
    ///    Query::eq("in_stock", true),
    ///    Query::gt("published_year", 2010),
    /// ]);
    /// assert_eq!(
    ///     query.to_document(),
    ///     doc! { "in_stock": true, "published_year": { "$gt": 2010 } }
    /// );
    /// ```
    pub fn to_document(&self) -> Document {
        match self {
            Self::Eq(key, value) => doc! { key.as_str(): value.clone() },
            Self::Ne(key, value) => doc! { key.as_str(): { "$ne": value.clone() } },
            Self::Lt(key, value) => doc! { key.as_str(): { "$lt": value.clone() } },
            Self::Lte(key, value) => doc! { key.as_str(): { "$lte": value.clone() } },
            Self::Gt(key, value) => doc! { key.as_str(): { "$gt": value.clone() } },
            Self::Gte(key, value) => doc! { key.as_str(): { "$gte": value.clone() } },
            Self::And(queries) => {
                let parts: Vec<Document> = queries.iter().map(Query::to_document).collect();
                let mut merged = Document::new();
                for part in &parts {
                    for (key, value) in part {
                        if merged.contains_key(key) || key.starts_with('$') {
                            let clauses: Vec<Bson> =
                                parts.iter().cloned().map(Bson::Document).collect();
                            return doc! { "$and": clauses };
                        }
                        merged.insert(key.clone(), value.clone());
                    }
                }
                merged
            }
            Self::All => Document::new(),
        }
    }

    /// Check if the query matches the document.
    ///
    /// ```
    /// use bookstore_core::database::query::Query;
    /// use bson::doc;
    /// let query = Query::gt("published_year", 2010);
    /// assert!(query.matches(&doc! { "published_year": 2011 }));
    /// assert!(!query.matches(&doc! { "published_year": 2010 }));
    /// ```
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Eq(key, expected) => match get_path(document, key.as_str()) {
                Some(value) => any_element(value, |v| values_equal(v, expected)),
                None => matches!(expected, Bson::Null),
            },
            Self::Ne(key, expected) => match get_path(document, key.as_str()) {
                Some(value) => !any_element(value, |v| values_equal(v, expected)),
                None => !matches!(expected, Bson::Null),
            },
            Self::Lt(key, bound) => compare_field(document, key, bound, |o| o == Ordering::Less),
            Self::Lte(key, bound) => compare_field(document, key, bound, |o| o != Ordering::Greater),
            Self::Gt(key, bound) => compare_field(document, key, bound, |o| o == Ordering::Greater),
            Self::Gte(key, bound) => compare_field(document, key, bound, |o| o != Ordering::Less),
            Self::And(queries) => queries.iter().all(|query| query.matches(document)),
            Self::All => true,
        }
    }
}

/// Resolve a dotted path such as `address.city` through nested subdocuments. Arrays are not
/// descended into: `reviews.score` resolves to nothing when `reviews` is an array.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut value = document.get(segments.next()?)?;
    for segment in segments {
        value = match value {
            Bson::Document(nested) => nested.get(segment)?,
            _ => return None,
        };
    }
    Some(value)
}

fn any_element<F>(value: &Bson, predicate: F) -> bool
where
    F: Fn(&Bson) -> bool,
{
    match value {
        Bson::Array(items) => predicate(value) || items.iter().any(&predicate),
        _ => predicate(value),
    }
}

// Range operators only compare values of the same type bracket, numbers with numbers and
// strings with strings.
fn compare_field<F>(document: &Document, key: &Key, bound: &Bson, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match get_path(document, key.as_str()) {
        Some(value) => any_element(value, |v| {
            type_rank(v) == type_rank(bound) && accept(compare_values(v, bound))
        }),
        None => false,
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

pub fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Total order over values, following the server's cross-type sort order and comparing
/// numbers by value regardless of their width.
pub fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        (Bson::Array(a), Bson::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare_values(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Equality as the server sees it: `Int32(5)`, `Int64(5)` and `Double(5.0)` are equal.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}
