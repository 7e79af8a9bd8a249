use std::fmt;
use std::io::Write;

use bookstore_core::{
    book::Fixture,
    database::{
        find_many_options::{FindManyOptions, OrderDirection},
        index::IndexSpec,
        pipeline::Pipeline,
        query::Query,
    },
};
use bson::Document;
use log::*;

use crate::{
    error::{failed, RunnerError},
    queries, report,
    store::{BookStore, Connect},
};

/// One entry of the fixed sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Connect,
    Seed,
    ProgrammingBooks,
    PublishedAfter2010,
    BooksByAuthor,
    UpdatePrice,
    DeleteBook,
    InStockRecent,
    Projection,
    PriceAscending,
    PriceDescending,
    FirstPage,
    AveragePriceByGenre,
    TopAuthor,
    BooksByDecade,
    TitleIndex,
    AuthorYearIndex,
    ExplainTitle,
}

impl Step {
    /// The heading printed above the step's result.
    pub fn label(&self) -> &'static str {
        match self {
            Step::Connect => "✅ Connected",
            Step::Seed => "🌱 Seeded books",
            Step::ProgrammingBooks => "📚 Programming Books",
            Step::PublishedAfter2010 => "📅 Books published after 2010",
            Step::BooksByAuthor => "👨‍💻 Books by Robert C. Martin",
            Step::UpdatePrice => "💰 Updated Clean Code price",
            Step::DeleteBook => "🗑️ Deleted 'Clean Code'",
            Step::InStockRecent => "📦 In-stock books published after 2010",
            Step::Projection => "📝 Projection (title, author, price)",
            Step::PriceAscending => "📈 Books sorted by price (asc)",
            Step::PriceDescending => "📉 Books sorted by price (desc)",
            Step::FirstPage => "📄 Page 1 (5 books)",
            Step::AveragePriceByGenre => "📊 Average Price by Genre",
            Step::TopAuthor => "🏆 Author with Most Books",
            Step::BooksByDecade => "📚 Books grouped by decade",
            Step::TitleIndex => "🔍 Created index on 'title'",
            Step::AuthorYearIndex => "🔍 Created compound index on 'author' + 'published_year'",
            Step::ExplainTitle => "📈 Performance Analysis (executionStats)",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Connect => "connect",
            Step::Seed => "seed",
            Step::ProgrammingBooks => "find programming books",
            Step::PublishedAfter2010 => "find books published after 2010",
            Step::BooksByAuthor => "find books by author",
            Step::UpdatePrice => "update price",
            Step::DeleteBook => "delete book",
            Step::InStockRecent => "find in-stock recent books",
            Step::Projection => "find with projection",
            Step::PriceAscending => "sort by price ascending",
            Step::PriceDescending => "sort by price descending",
            Step::FirstPage => "paginate",
            Step::AveragePriceByGenre => "aggregate average price by genre",
            Step::TopAuthor => "aggregate top author",
            Step::BooksByDecade => "aggregate books by decade",
            Step::TitleIndex => "create title index",
            Step::AuthorYearIndex => "create author/year index",
            Step::ExplainTitle => "explain title query",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Connected,
    Inserted(u64),
    Documents(Vec<Document>),
    Modified(bool),
    Deleted(bool),
    IndexCreated(String),
    ExecutionStats(Document),
}

/// What a run produced: the outcome of every completed step in order, and the error
/// that ended the sequence early, if any.
#[derive(Debug, Default)]
pub struct RunReport {
    pub completed: Vec<(Step, Outcome)>,
    pub error: Option<RunnerError>,
}

impl RunReport {
    fn record(&mut self, step: Step, outcome: Outcome) {
        self.completed.push((step, outcome));
    }

    pub fn outcome(&self, step: Step) -> Option<&Outcome> {
        self.completed
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn documents(&self, step: Step) -> Option<&[Document]> {
        match self.outcome(step) {
            Some(Outcome::Documents(documents)) => Some(documents),
            _ => None,
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        self.completed.iter().map(|(step, _)| *step).collect()
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the walkthrough, in order, against whatever `C` connects to.
pub struct Runner<C: Connect> {
    connector: C,
    seed: Option<Fixture>,
}

impl<C: Connect> Runner<C> {
    pub fn new(connector: C) -> Self {
        Runner {
            connector,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<Fixture>) -> Self {
        self.seed = seed;
        self
    }

    /// Execute every step, writing each result to `out` before moving on. A database
    /// failure stops the sequence, is written to `errors` and is reported in the returned
    /// [`RunReport`]; only a failure to write to either sink is returned as an error. The
    /// store is closed in every case once it was acquired.
    pub async fn run<W: Write, E: Write>(
        &self,
        out: &mut W,
        errors: &mut E,
    ) -> Result<RunReport, RunnerError> {
        let mut report = RunReport::default();

        info!("Connecting to {}", self.connector.backend());
        let result = match self.connector.connect().await {
            Ok(store) => {
                let result = self.run_steps(&store, out, &mut report).await;
                store.close().await;
                result
            }
            Err(source) => Err(failed(Step::Connect)(source)),
        };

        match result {
            Ok(()) => info!("All steps completed"),
            Err(RunnerError::Output(err)) => return Err(RunnerError::Output(err)),
            Err(err) => {
                error!("Error running queries: {:?}", err);
                if let RunnerError::DatabaseOperationFailed { step, source } = &err {
                    writeln!(errors, "❌ Error running queries: {step} failed: {source:#}")?;
                }
                report.error = Some(err);
            }
        }

        writeln!(out, "\n🔌 Connection closed")?;
        Ok(report)
    }

    async fn run_steps<S: BookStore, W: Write>(
        &self,
        store: &S,
        out: &mut W,
        report: &mut RunReport,
    ) -> Result<(), RunnerError> {
        let mut session = Session { store, out, report };
        writeln!(session.out, "{} to {}", Step::Connect.label(), self.connector.backend())?;
        session.report.record(Step::Connect, Outcome::Connected);

        if let Some(fixture) = &self.seed {
            session.seed(fixture).await?;
        }

        writeln!(session.out, "\n📌 CRUD")?;
        session.find(Step::ProgrammingBooks, queries::programming_books(), None).await?;
        session.find(Step::PublishedAfter2010, queries::published_after_2010(), None).await?;
        session.find(Step::BooksByAuthor, queries::books_by_author(), None).await?;
        session.update_price().await?;
        session.delete_book().await?;

        writeln!(session.out, "\n📌 Advanced Queries")?;
        session.find(Step::InStockRecent, queries::in_stock_recent(), None).await?;
        session
            .find(Step::Projection, Query::all(), Some(queries::title_author_price()))
            .await?;
        let ascending = queries::by_price(OrderDirection::Ascending);
        session
            .find(Step::PriceAscending, Query::all(), Some(ascending))
            .await?;
        let descending = queries::by_price(OrderDirection::Descending);
        session
            .find(Step::PriceDescending, Query::all(), Some(descending))
            .await?;
        session.find(Step::FirstPage, Query::all(), Some(queries::page(0))).await?;

        writeln!(session.out, "\n📌 Aggregation")?;
        session.aggregate(Step::AveragePriceByGenre, queries::average_price_by_genre()).await?;
        session.aggregate(Step::TopAuthor, queries::top_author()).await?;
        session.aggregate(Step::BooksByDecade, queries::books_by_decade()).await?;

        writeln!(session.out, "\n📌 Indexing")?;
        session
            .create_index(Step::TitleIndex, queries::title_index(), true)
            .await?;
        session
            .create_index(Step::AuthorYearIndex, queries::author_year_index(), false)
            .await?;
        session.explain().await?;
        Ok(())
    }
}

/// The store, sink and report of one run, threaded through each step.
struct Session<'a, S, W> {
    store: &'a S,
    out: &'a mut W,
    report: &'a mut RunReport,
}

impl<S: BookStore, W: Write> Session<'_, S, W> {
    async fn seed(&mut self, fixture: &Fixture) -> Result<(), RunnerError> {
        info!("Step: {}", Step::Seed);
        let documents = fixture.documents().map_err(failed(Step::Seed))?;
        let inserted = self
            .store
            .insert_many(documents)
            .await
            .map_err(failed(Step::Seed))?;
        writeln!(self.out, "\n{}: {}", Step::Seed.label(), inserted)?;
        self.report.record(Step::Seed, Outcome::Inserted(inserted));
        Ok(())
    }

    async fn find(
        &mut self,
        step: Step,
        query: Query,
        find_many_options: Option<FindManyOptions>,
    ) -> Result<(), RunnerError> {
        info!("Step: {}", step);
        let documents = self
            .store
            .find_many(&query, find_many_options)
            .await
            .map_err(failed(step))?;
        writeln!(self.out, "\n{}:", step.label())?;
        report::write_documents(&mut *self.out, &documents)?;
        self.report.record(step, Outcome::Documents(documents));
        Ok(())
    }

    async fn aggregate(&mut self, step: Step, pipeline: Pipeline) -> Result<(), RunnerError> {
        info!("Step: {}", step);
        let documents = self.store.aggregate(&pipeline).await.map_err(failed(step))?;
        writeln!(self.out, "\n{}:", step.label())?;
        report::write_documents(&mut *self.out, &documents)?;
        self.report.record(step, Outcome::Documents(documents));
        Ok(())
    }

    async fn update_price(&mut self) -> Result<(), RunnerError> {
        let step = Step::UpdatePrice;
        info!("Step: {}", step);
        let outcome = self
            .store
            .update_one(&queries::featured_title(), &queries::price_update())
            .await
            .map_err(failed(step))?;
        let modified = outcome.modified > 0;
        let verdict = if modified { "Success" } else { "No changes" };
        writeln!(self.out, "\n{}: {}", step.label(), verdict)?;
        self.report.record(step, Outcome::Modified(modified));
        Ok(())
    }

    async fn delete_book(&mut self) -> Result<(), RunnerError> {
        let step = Step::DeleteBook;
        info!("Step: {}", step);
        let deleted = self
            .store
            .delete_one(&queries::featured_title())
            .await
            .map_err(failed(step))?
            > 0;
        let verdict = if deleted { "Success" } else { "Not found" };
        writeln!(self.out, "{}: {}", step.label(), verdict)?;
        self.report.record(step, Outcome::Deleted(deleted));
        Ok(())
    }

    async fn create_index(
        &mut self,
        step: Step,
        index: IndexSpec,
        leading_blank: bool,
    ) -> Result<(), RunnerError> {
        info!("Step: {}", step);
        let name = self.store.create_index(&index).await.map_err(failed(step))?;
        let gap = if leading_blank { "\n" } else { "" };
        writeln!(self.out, "{}{}: {}", gap, step.label(), name)?;
        self.report.record(step, Outcome::IndexCreated(name));
        Ok(())
    }

    async fn explain(&mut self) -> Result<(), RunnerError> {
        let step = Step::ExplainTitle;
        info!("Step: {}", step);
        let explain = self
            .store
            .explain(&queries::featured_title())
            .await
            .map_err(failed(step))?;
        let stats = explain
            .get_document("executionStats")
            .map_err(|e| failed(step)(anyhow::anyhow!("explain output has no executionStats: {e}")))?
            .clone();
        writeln!(self.out, "\n{}:", step.label())?;
        report::write_document(&mut *self.out, &stats)?;
        self.report.record(step, Outcome::ExecutionStats(stats));
        Ok(())
    }
}
