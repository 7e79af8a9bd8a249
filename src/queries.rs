//! The fixed requests of the walkthrough, one constructor per step.

use bookstore_core::database::{
    find_many_options::{FindManyOptions, FindManyOrder, OrderDirection, Projection},
    index::IndexSpec,
    pipeline::{Accumulator, GroupKey, Pipeline, ProjectField, Stage},
    query::Query,
    update::Update,
};
use bson::doc;

pub const FEATURED_TITLE: &str = "Clean Code";
pub const FEATURED_AUTHOR: &str = "Robert C. Martin";
pub const UPDATED_PRICE: f64 = 29.99;
pub const RECENT_AFTER_YEAR: i32 = 2010;
pub const PAGE_SIZE: i64 = 5;

pub fn programming_books() -> Query {
    Query::eq("genre", "Programming")
}

pub fn published_after_2010() -> Query {
    Query::gt("published_year", RECENT_AFTER_YEAR)
}

pub fn books_by_author() -> Query {
    Query::eq("author", FEATURED_AUTHOR)
}

pub fn featured_title() -> Query {
    Query::eq("title", FEATURED_TITLE)
}

pub fn price_update() -> Update {
    Update::set(doc! { "price": UPDATED_PRICE })
}

pub fn in_stock_recent() -> Query {
    Query::and(vec![
        Query::eq("in_stock", true),
        Query::gt("published_year", RECENT_AFTER_YEAR),
    ])
}

pub fn title_author_price() -> FindManyOptions {
    FindManyOptions::default().project(Projection::include(&["title", "author", "price"]).without_id())
}

pub fn by_price(direction: OrderDirection) -> FindManyOptions {
    FindManyOptions::default().order_by("price", direction)
}

/// Zero-based page of `PAGE_SIZE` books in natural order.
pub fn page(number: u64) -> FindManyOptions {
    FindManyOptions::default()
        .skip(number * PAGE_SIZE as u64)
        .limit(PAGE_SIZE)
}

pub fn average_price_by_genre() -> Pipeline {
    Pipeline::new(vec![Stage::Group {
        key: GroupKey::Field("genre".to_string()),
        fields: vec![("avgPrice".to_string(), Accumulator::Avg("price".to_string()))],
    }])
}

/// Ties on the count are broken by whatever order the engine groups in.
pub fn top_author() -> Pipeline {
    Pipeline::new(vec![
        Stage::Group {
            key: GroupKey::Field("author".to_string()),
            fields: vec![("count".to_string(), Accumulator::Count)],
        },
        Stage::Sort(vec![FindManyOrder {
            property: "count".to_string(),
            direction: OrderDirection::Descending,
        }]),
        Stage::Limit(1),
    ])
}

pub fn books_by_decade() -> Pipeline {
    Pipeline::new(vec![
        Stage::Group {
            key: GroupKey::Bucket {
                field: "published_year".to_string(),
                width: 10,
            },
            fields: vec![("count".to_string(), Accumulator::Count)],
        },
        Stage::Project {
            fields: vec![
                ("decade".to_string(), ProjectField::ScaleId { factor: 10 }),
                ("count".to_string(), ProjectField::Keep),
            ],
            exclude_id: true,
        },
    ])
}

pub fn title_index() -> IndexSpec {
    IndexSpec::ascending("title")
}

pub fn author_year_index() -> IndexSpec {
    IndexSpec::ascending("author").then_descending("published_year")
}
