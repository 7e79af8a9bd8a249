use bson::{Document, doc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    /// The numeric form used in sort and index key documents.
    pub fn as_i32(&self) -> i32 {
        match self {
            OrderDirection::Ascending => 1,
            OrderDirection::Descending => -1,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FindManyOrder {
    pub property: String,
    pub direction: OrderDirection,
}

/// Field selection applied to every returned document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude_id: bool,
}

impl Projection {
    pub fn include(fields: &[&str]) -> Self {
        Projection {
            include: fields.iter().map(|f| f.to_string()).collect(),
            exclude_id: false,
        }
    }

    pub fn without_id(mut self) -> Self {
        self.exclude_id = true;
        self
    }

    /// ```
    /// use bookstore_core::database::find_many_options::Projection;
    /// use bson::doc;
    /// let projection = Projection::include(&["title", "price"]).without_id();
    /// assert_eq!(projection.to_document(), doc! { "title": 1, "price": 1, "_id": 0 });
    /// ```
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        for field in &self.include {
            document.insert(field.clone(), 1);
        }
        if self.exclude_id {
            document.insert("_id", 0);
        }
        document
    }

    pub fn apply(&self, document: &Document) -> Document {
        document
            .iter()
            .filter(|(key, _)| {
                if key.as_str() == "_id" {
                    !self.exclude_id
                } else {
                    self.include.iter().any(|field| field == *key)
                }
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct FindManyOptions {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub order: Option<Vec<FindManyOrder>>,
    pub projection: Option<Projection>,
}

impl FindManyOptions {
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, property: &str, direction: OrderDirection) -> Self {
        self.order.get_or_insert_with(Vec::new).push(FindManyOrder {
            property: property.to_string(),
            direction,
        });
        self
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// ```
    /// use bookstore_core::database::find_many_options::{FindManyOptions, OrderDirection};
    /// use bson::doc;
    /// let options = FindManyOptions::default().order_by("price", OrderDirection::Descending);
    /// assert_eq!(options.sort_document(), Some(doc! { "price": -1 }));
    /// ```
    pub fn sort_document(&self) -> Option<Document> {
        self.order.as_ref().map(|order| sort_document(order))
    }
}

pub fn sort_document(order: &[FindManyOrder]) -> Document {
    let mut document = doc! {};
    for FindManyOrder {
        property,
        direction,
    } in order
    {
        document.insert(property.clone(), direction.as_i32());
    }
    document
}
