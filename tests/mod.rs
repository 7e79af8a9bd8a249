use anyhow::Error;
use bookstore::*;
use bson::{doc, Document};

fn clean_code() -> Book {
    Book::new("Clean Code", "Robert C. Martin", "Programming", 2008, 35.0, true)
}

fn shelf() -> Vec<Book> {
    vec![
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true),
        clean_code(),
        Book::new("The Clean Coder", "Robert C. Martin", "Programming", 2011, 28.5, true),
        Book::new("Clean Architecture", "Robert C. Martin", "Programming", 2017, 31.99, false),
        Book::new("The Pragmatic Programmer", "Andrew Hunt", "Programming", 1999, 39.95, true),
        Book::new("Boundary Year", "Anne Author", "Fiction", 2010, 20.0, true),
        Book::new("Dune", "Frank Herbert", "Science Fiction", 1965, 9.99, true),
        Book::new("Project Hail Mary", "Andy Weir", "Science Fiction", 2021, 18.0, true),
        Book::new("The Martian", "Andy Weir", "Science Fiction", 2011, 14.0, false),
        Book::new("Mid Nineties", "Anne Author", "Fiction", 1995, 11.0, true),
        Book::new("Mid Noughties", "Anne Author", "Fiction", 2005, 13.0, false),
    ]
}

async fn run_with(
    store: &MemoryStore,
    books: Vec<Book>,
) -> Result<(RunReport, String), Error> {
    let (report, output, _) = run_capturing_errors(store.clone(), Some(books)).await?;
    Ok((report, output))
}

/// Runs against `connector` and returns the report, stdout and stderr separately.
async fn run_capturing_errors<C: Connect>(
    connector: C,
    books: Option<Vec<Book>>,
) -> Result<(RunReport, String, String), Error> {
    let mut out = Vec::new();
    let mut errors = Vec::new();
    let report = Runner::new(connector)
        .with_seed(books.map(Fixture::new))
        .run(&mut out, &mut errors)
        .await?;
    Ok((report, String::from_utf8(out)?, String::from_utf8(errors)?))
}

fn titles(documents: &[Document]) -> Vec<&str> {
    documents
        .iter()
        .filter_map(|d| d.get_str("title").ok())
        .collect()
}

fn price(document: &Document) -> f64 {
    document.get_f64("price").unwrap_or(f64::NAN)
}

#[tokio::test]
async fn single_clean_code_document_end_to_end() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, output) = run_with(&store, vec![clean_code()]).await?;

    assert!(report.succeeded());
    assert_eq!(report.outcome(Step::Seed), Some(&Outcome::Inserted(1)));
    assert_eq!(report.outcome(Step::UpdatePrice), Some(&Outcome::Modified(true)));
    assert_eq!(report.outcome(Step::DeleteBook), Some(&Outcome::Deleted(true)));
    assert!(output.contains("💰 Updated Clean Code price: Success"));
    assert!(output.contains("🗑️ Deleted 'Clean Code': Success"));
    assert!(output.ends_with("\n🔌 Connection closed\n"));

    let remaining = store.find_many(&Query::eq("title", "Clean Code"), None).await?;
    assert!(remaining.is_empty());
    assert_eq!(store.count().await, 0);
    Ok(())
}

#[tokio::test]
async fn every_step_runs_in_order() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, output) = run_with(&store, shelf()).await?;

    let expected = vec![
        Step::Connect,
        Step::Seed,
        Step::ProgrammingBooks,
        Step::PublishedAfter2010,
        Step::BooksByAuthor,
        Step::UpdatePrice,
        Step::DeleteBook,
        Step::InStockRecent,
        Step::Projection,
        Step::PriceAscending,
        Step::PriceDescending,
        Step::FirstPage,
        Step::AveragePriceByGenre,
        Step::TopAuthor,
        Step::BooksByDecade,
        Step::TitleIndex,
        Step::AuthorYearIndex,
        Step::ExplainTitle,
    ];
    assert_eq!(report.steps(), expected);

    let mut last = 0;
    for step in expected {
        let position = output
            .find(step.label())
            .ok_or_else(|| anyhow::anyhow!("missing label for {step}"))?;
        assert!(position >= last, "{step} printed out of order");
        last = position;
    }
    assert!(!output.contains("Error running queries"));
    Ok(())
}

#[tokio::test]
async fn filters_return_exact_subsets() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    let programming = report
        .documents(Step::ProgrammingBooks)
        .ok_or_else(|| anyhow::anyhow!("no programming books"))?;
    assert_eq!(
        titles(programming),
        vec![
            "Clean Code",
            "The Clean Coder",
            "Clean Architecture",
            "The Pragmatic Programmer"
        ]
    );

    let recent = report
        .documents(Step::PublishedAfter2010)
        .ok_or_else(|| anyhow::anyhow!("no recent books"))?;
    assert!(!titles(recent).contains(&"Boundary Year"));
    assert_eq!(recent.len(), 4);
    assert!(recent.iter().all(|d| d.get_i32("published_year").unwrap_or(0) > 2010));

    let by_author = report
        .documents(Step::BooksByAuthor)
        .ok_or_else(|| anyhow::anyhow!("no books by author"))?;
    assert_eq!(by_author.len(), 3);

    // Runs after the delete, so Clean Code is gone.
    let in_stock_recent = report
        .documents(Step::InStockRecent)
        .ok_or_else(|| anyhow::anyhow!("no in-stock recent books"))?;
    assert_eq!(
        titles(in_stock_recent),
        vec!["The Clean Coder", "Project Hail Mary"]
    );
    Ok(())
}

#[tokio::test]
async fn projection_keeps_only_title_author_price() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    let projected = report
        .documents(Step::Projection)
        .ok_or_else(|| anyhow::anyhow!("no projection"))?;
    assert_eq!(projected.len(), shelf().len() - 1);
    for document in projected {
        let keys: Vec<&str> = document.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "author", "price"]);
    }
    Ok(())
}

#[tokio::test]
async fn sorted_prices_are_monotonic() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    let ascending: Vec<f64> = report
        .documents(Step::PriceAscending)
        .ok_or_else(|| anyhow::anyhow!("no ascending sort"))?
        .iter()
        .map(price)
        .collect();
    assert!(ascending.windows(2).all(|pair| pair[0] <= pair[1]));

    let descending: Vec<f64> = report
        .documents(Step::PriceDescending)
        .ok_or_else(|| anyhow::anyhow!("no descending sort"))?
        .iter()
        .map(price)
        .collect();
    assert!(descending.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(ascending.len(), descending.len());
    Ok(())
}

#[tokio::test]
async fn first_page_is_the_head_of_natural_order() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    let page = report
        .documents(Step::FirstPage)
        .ok_or_else(|| anyhow::anyhow!("no page"))?;
    let everything = store.find_many(&Query::all(), None).await?;
    assert!(page.len() <= 5);
    assert_eq!(page, &everything[..5]);
    Ok(())
}

#[tokio::test]
async fn short_collection_yields_a_short_page() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let books = vec![
        Book::new("Dune", "Frank Herbert", "Science Fiction", 1965, 9.99, true),
        Book::new("The Martian", "Andy Weir", "Science Fiction", 2011, 14.0, false),
    ];
    let (report, _) = run_with(&store, books).await?;
    assert_eq!(report.documents(Step::FirstPage).map(<[Document]>::len), Some(2));
    assert_eq!(report.outcome(Step::UpdatePrice), Some(&Outcome::Modified(false)));
    assert_eq!(report.outcome(Step::DeleteBook), Some(&Outcome::Deleted(false)));
    Ok(())
}

#[tokio::test]
async fn average_price_per_genre() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let books = vec![
        Book::new("A", "One", "Fiction", 1990, 10.0, true),
        Book::new("B", "Two", "Poetry", 1991, 7.0, true),
        Book::new("C", "One", "Fiction", 1992, 20.0, true),
        Book::new("D", "Two", "Poetry", 1993, 8.0, true),
    ];
    let (report, _) = run_with(&store, books).await?;

    let averages = report
        .documents(Step::AveragePriceByGenre)
        .ok_or_else(|| anyhow::anyhow!("no averages"))?;
    assert_eq!(averages.len(), 2);
    for average in averages {
        let expected = match average.get_str("_id")? {
            "Fiction" => 15.0,
            "Poetry" => 7.5,
            other => panic!("unexpected genre {other}"),
        };
        assert!((average.get_f64("avgPrice")? - expected).abs() < 1e-9);
    }
    Ok(())
}

#[tokio::test]
async fn top_author_has_the_most_books() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    // Robert C. Martin is down to two books once Clean Code is deleted.
    let top = report
        .documents(Step::TopAuthor)
        .ok_or_else(|| anyhow::anyhow!("no top author"))?;
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].get_i32("count")?, 3);
    assert_eq!(top[0].get_str("_id")?, "Anne Author");
    Ok(())
}

#[tokio::test]
async fn decades_bucket_by_floor() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, _) = run_with(&store, shelf()).await?;

    let decades = report
        .documents(Step::BooksByDecade)
        .ok_or_else(|| anyhow::anyhow!("no decades"))?;
    let count_for = |decade: f64| {
        decades
            .iter()
            .find(|d| d.get_f64("decade").ok() == Some(decade))
            .and_then(|d| d.get_i32("count").ok())
    };
    assert_eq!(count_for(1990.0), Some(2));
    assert_eq!(count_for(2000.0), Some(1));
    assert_eq!(count_for(2010.0), Some(4));
    assert_eq!(count_for(2020.0), Some(1));
    assert!(decades.iter().all(|d| !d.contains_key("_id")));
    Ok(())
}

#[tokio::test]
async fn indexes_are_created_and_explain_reports_a_collection_scan() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let (report, output) = run_with(&store, shelf()).await?;

    assert_eq!(
        report.outcome(Step::TitleIndex),
        Some(&Outcome::IndexCreated("title_1".to_string()))
    );
    assert_eq!(
        report.outcome(Step::AuthorYearIndex),
        Some(&Outcome::IndexCreated("author_1_published_year_-1".to_string()))
    );
    assert_eq!(
        store.list_indexes().await,
        vec!["_id_", "title_1", "author_1_published_year_-1"]
    );

    match report.outcome(Step::ExplainTitle) {
        Some(Outcome::ExecutionStats(stats)) => {
            // Clean Code is already deleted; the remaining ten books are all scanned.
            assert_eq!(stats.get_i64("nReturned")?, 0);
            assert_eq!(stats.get_i64("totalKeysExamined")?, 0);
            assert_eq!(stats.get_i64("totalDocsExamined")?, shelf().len() as i64 - 1);
        }
        other => panic!("unexpected explain outcome {other:?}"),
    }
    assert!(output.contains("\"nReturned\": 0"));
    Ok(())
}

#[tokio::test]
async fn second_run_is_not_idempotent_but_does_not_fail() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    run_with(&store, shelf()).await?;

    let (report, _, errors) = run_capturing_errors(store.clone(), None).await?;
    assert!(report.succeeded());
    assert!(errors.is_empty());
    assert_eq!(report.outcome(Step::Seed), None);
    assert_eq!(report.outcome(Step::UpdatePrice), Some(&Outcome::Modified(false)));
    assert_eq!(report.outcome(Step::DeleteBook), Some(&Outcome::Deleted(false)));
    assert_eq!(
        report.outcome(Step::TitleIndex),
        Some(&Outcome::IndexCreated("title_1".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn failing_step_stops_the_sequence_and_still_closes() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    store
        .create_index(&IndexSpec::descending("title").named("title_1"))
        .await?;

    let (report, output, errors) = run_capturing_errors(store.clone(), Some(shelf())).await?;

    assert!(!report.succeeded());
    assert!(report.outcome(Step::BooksByDecade).is_some());
    assert_eq!(report.outcome(Step::TitleIndex), None);
    assert_eq!(report.outcome(Step::AuthorYearIndex), None);
    assert_eq!(report.outcome(Step::ExplainTitle), None);
    match &report.error {
        Some(err) => assert_eq!(err.step(), Some(Step::TitleIndex)),
        None => panic!("expected an error"),
    }

    assert!(errors.starts_with("❌ Error running queries: create title index failed:"));
    assert!(!output.contains("Error running queries"));
    assert!(!output.contains(Step::AuthorYearIndex.label()));
    assert!(output.ends_with("\n🔌 Connection closed\n"));
    Ok(())
}

struct Unreachable;

struct NeverStore;

impl BookStore for NeverStore {
    async fn find_many(
        &self,
        _query: &Query,
        _find_many_options: Option<FindManyOptions>,
    ) -> Result<Vec<Document>, Error> {
        unreachable!()
    }

    async fn insert_many(&self, _documents: Vec<Document>) -> Result<u64, Error> {
        unreachable!()
    }

    async fn update_one(&self, _query: &Query, _update: &Update) -> Result<UpdateOutcome, Error> {
        unreachable!()
    }

    async fn delete_one(&self, _query: &Query) -> Result<u64, Error> {
        unreachable!()
    }

    async fn aggregate(&self, _pipeline: &Pipeline) -> Result<Vec<Document>, Error> {
        unreachable!()
    }

    async fn create_index(&self, _index: &IndexSpec) -> Result<String, Error> {
        unreachable!()
    }

    async fn explain(&self, _query: &Query) -> Result<Document, Error> {
        unreachable!()
    }

    async fn close(self) {
        unreachable!()
    }
}

impl Connect for Unreachable {
    type Store = NeverStore;

    fn backend(&self) -> &str {
        "nowhere"
    }

    async fn connect(&self) -> Result<NeverStore, Error> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

#[tokio::test]
async fn connect_failure_skips_every_step() -> Result<(), Error> {
    let (report, output, errors) = run_capturing_errors(Unreachable, None).await?;

    assert!(report.completed.is_empty());
    match &report.error {
        Some(err) => assert_eq!(err.step(), Some(Step::Connect)),
        None => panic!("expected an error"),
    }
    assert_eq!(
        errors,
        "❌ Error running queries: connect failed: connection refused\n"
    );
    assert_eq!(output, "\n🔌 Connection closed\n");
    Ok(())
}

/// Delegates to a [`MemoryStore`] but answers explain without execution statistics.
#[derive(Clone)]
struct StatsLessStore(MemoryStore);

impl BookStore for StatsLessStore {
    async fn find_many(
        &self,
        query: &Query,
        find_many_options: Option<FindManyOptions>,
    ) -> Result<Vec<Document>, Error> {
        self.0.find_many(query, find_many_options).await
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64, Error> {
        self.0.insert_many(documents).await
    }

    async fn update_one(&self, query: &Query, update: &Update) -> Result<UpdateOutcome, Error> {
        self.0.update_one(query, update).await
    }

    async fn delete_one(&self, query: &Query) -> Result<u64, Error> {
        self.0.delete_one(query).await
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, Error> {
        self.0.aggregate(pipeline).await
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String, Error> {
        self.0.create_index(index).await
    }

    async fn explain(&self, _query: &Query) -> Result<Document, Error> {
        Ok(doc! {})
    }

    async fn close(self) {
        self.0.close().await
    }
}

impl Connect for StatsLessStore {
    type Store = StatsLessStore;

    fn backend(&self) -> &str {
        "in-memory engine without explain stats"
    }

    async fn connect(&self) -> Result<StatsLessStore, Error> {
        Ok(self.clone())
    }
}

#[tokio::test]
async fn explain_without_execution_stats_fails_the_last_step() -> Result<(), Error> {
    let store = StatsLessStore(MemoryStore::new("books"));
    let (report, output, errors) = run_capturing_errors(store, Some(shelf())).await?;

    assert!(!report.succeeded());
    assert_eq!(report.error.as_ref().and_then(RunnerError::step), Some(Step::ExplainTitle));
    assert!(report.outcome(Step::AuthorYearIndex).is_some());
    assert_eq!(report.outcome(Step::ExplainTitle), None);
    assert!(errors.contains("explain title query failed: explain output has no executionStats"));
    assert!(!output.contains(Step::ExplainTitle.label()));
    assert!(output.ends_with("\n🔌 Connection closed\n"));
    Ok(())
}

#[tokio::test]
async fn seed_with_duplicate_ids_fails_before_any_query() -> Result<(), Error> {
    let store = MemoryStore::new("books");
    let id = bson::oid::ObjectId::new();
    let result = store
        .insert_many(vec![doc! { "_id": id, "title": "A" }, doc! { "_id": id, "title": "B" }])
        .await;
    assert!(result.is_err());
    assert_eq!(store.count().await, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "needs a MongoDB server on MONGODB_URI"]
async fn mongo_smoke() -> Result<(), Error> {
    let mut environment = Environment::load(&cli::Cli::default())?;
    environment.collection = "books_smoke".to_string();

    let connector = MongoConnector::new(&environment);
    let (report, _, errors) = run_capturing_errors(connector, Some(vec![clean_code()])).await?;
    assert!(report.succeeded(), "{errors}");
    assert_eq!(report.outcome(Step::DeleteBook), Some(&Outcome::Deleted(true)));
    Ok(())
}
