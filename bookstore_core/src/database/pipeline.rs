use anyhow::{Error, anyhow};
use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use super::{
    find_many_options::{FindManyOrder, OrderDirection, sort_document},
    query::{as_number, compare_values, get_path, values_equal},
};

/// The `_id` of a `$group` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupKey {
    /// Group on the raw value of a field.
    Field(String),
    /// Group on `floor(field / width)`.
    Bucket { field: String, width: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    Avg(String),
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectField {
    /// Pass the field through unchanged.
    Keep,
    /// Emit the numeric group `_id` multiplied by `factor`.
    ScaleId { factor: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Group {
        key: GroupKey,
        fields: Vec<(String, Accumulator)>,
    },
    Sort(Vec<FindManyOrder>),
    Limit(i64),
    Project {
        fields: Vec<(String, ProjectField)>,
        exclude_id: bool,
    },
}

impl GroupKey {
    fn to_bson(&self) -> Bson {
        match self {
            GroupKey::Field(field) => Bson::String(format!("${field}")),
            GroupKey::Bucket { field, width } => Bson::Document(doc! {
                "$floor": { "$divide": [format!("${field}"), *width] }
            }),
        }
    }

    fn evaluate(&self, document: &Document) -> Bson {
        match self {
            GroupKey::Field(field) => get_path(document, field).cloned().unwrap_or(Bson::Null),
            GroupKey::Bucket { field, width } => {
                match get_path(document, field).and_then(as_number) {
                    Some(value) => Bson::Double((value / *width as f64).floor()),
                    None => Bson::Null,
                }
            }
        }
    }
}

impl Accumulator {
    fn to_document(&self) -> Document {
        match self {
            Accumulator::Avg(field) => doc! { "$avg": format!("${field}") },
            Accumulator::Count => doc! { "$sum": 1 },
        }
    }
}

impl Stage {
    /// Render the stage as it is sent to the server.
    ///
    /// ```
    /// use bookstore_core::database::pipeline::{Accumulator, GroupKey, Stage};
    /// use bson::doc;
    /// let stage = Stage::Group {
    ///     key: GroupKey::Field("genre".to_string()),
    ///     fields: vec![("avgPrice".to_string(), Accumulator::Avg("price".to_string()))],
    /// };
    /// assert_eq!(
    ///     stage.to_document(),
    ///     doc! { "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } }
    /// );
    /// ```
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Group { key, fields } => {
                let mut group = doc! { "_id": key.to_bson() };
                for (name, accumulator) in fields {
                    group.insert(name.clone(), accumulator.to_document());
                }
                doc! { "$group": group }
            }
            Stage::Sort(order) => doc! { "$sort": sort_document(order) },
            Stage::Limit(limit) => doc! { "$limit": *limit },
            Stage::Project { fields, exclude_id } => {
                let mut project = Document::new();
                for (name, field) in fields {
                    match field {
                        ProjectField::Keep => project.insert(name.clone(), 1),
                        ProjectField::ScaleId { factor } => project.insert(
                            name.clone(),
                            doc! { "$multiply": ["$_id", *factor] },
                        ),
                    };
                }
                if *exclude_id {
                    project.insert("_id", 0);
                }
                doc! { "$project": project }
            }
        }
    }

    fn execute(&self, documents: Vec<Document>) -> Result<Vec<Document>, Error> {
        match self {
            Stage::Group { key, fields } => Ok(group(documents, key, fields)),
            Stage::Sort(order) => {
                let mut documents = documents;
                sort_documents(&mut documents, order);
                Ok(documents)
            }
            Stage::Limit(limit) => {
                if *limit <= 0 {
                    return Err(anyhow!("the limit must be positive, got {limit}"));
                }
                Ok(documents.into_iter().take(*limit as usize).collect())
            }
            Stage::Project { fields, exclude_id } => Ok(documents
                .iter()
                .map(|document| project(document, fields, *exclude_id))
                .collect()),
        }
    }
}

struct GroupState {
    id: Bson,
    count: i32,
    sums: Vec<(f64, u32)>,
}

fn group(documents: Vec<Document>, key: &GroupKey, fields: &[(String, Accumulator)]) -> Vec<Document> {
    let mut groups: Vec<GroupState> = Vec::new();
    for document in &documents {
        let id = key.evaluate(document);
        let position = match groups.iter().position(|g| values_equal(&g.id, &id)) {
            Some(position) => position,
            None => {
                groups.push(GroupState {
                    id,
                    count: 0,
                    sums: vec![(0.0, 0); fields.len()],
                });
                groups.len() - 1
            }
        };
        let state = &mut groups[position];
        state.count += 1;
        for ((_, accumulator), sum) in fields.iter().zip(state.sums.iter_mut()) {
            if let Accumulator::Avg(field) = accumulator {
                if let Some(value) = get_path(document, field).and_then(as_number) {
                    sum.0 += value;
                    sum.1 += 1;
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|state| {
            let mut output = doc! { "_id": state.id };
            for ((name, accumulator), (total, seen)) in fields.iter().zip(state.sums) {
                let value = match accumulator {
                    Accumulator::Count => Bson::Int32(state.count),
                    Accumulator::Avg(_) if seen == 0 => Bson::Null,
                    Accumulator::Avg(_) => Bson::Double(total / seen as f64),
                };
                output.insert(name.clone(), value);
            }
            output
        })
        .collect()
}

/// Stable multi-key sort, missing fields sort as null.
pub fn sort_documents(documents: &mut [Document], order: &[FindManyOrder]) {
    documents.sort_by(|a, b| {
        for FindManyOrder {
            property,
            direction,
        } in order
        {
            let a_val = get_path(a, property).unwrap_or(&Bson::Null);
            let b_val = get_path(b, property).unwrap_or(&Bson::Null);
            let ord = compare_values(a_val, b_val);
            let ord = match direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn project(document: &Document, fields: &[(String, ProjectField)], exclude_id: bool) -> Document {
    let mut output = Document::new();
    if !exclude_id {
        if let Some(id) = document.get("_id") {
            output.insert("_id", id.clone());
        }
    }
    for (name, field) in fields {
        match field {
            ProjectField::Keep => {
                if let Some(value) = document.get(name) {
                    output.insert(name.clone(), value.clone());
                }
            }
            ProjectField::ScaleId { factor } => {
                let value = match document.get("_id") {
                    Some(Bson::Int32(id)) => Bson::Int64(*id as i64 * *factor as i64),
                    Some(Bson::Int64(id)) => Bson::Int64(id * *factor as i64),
                    Some(Bson::Double(id)) => Bson::Double(id * *factor as f64),
                    _ => Bson::Null,
                };
                output.insert(name.clone(), value);
            }
        }
    }
    output
}

/// An ordered list of aggregation stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Pipeline { stages }
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// Run the stages in order over an input sequence.
    pub fn execute(&self, documents: Vec<Document>) -> Result<Vec<Document>, Error> {
        self.stages
            .iter()
            .try_fold(documents, |documents, stage| stage.execute(documents))
    }
}
