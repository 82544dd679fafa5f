//! Query executor.
//!
//! Resolves the model, plans the read, follows store cursors page by page, and
//! post-processes the concatenated result. A failure on any page discards
//! everything fetched so far.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dynorm_proto::{Condition, Item, ReadFilter, WhereClause};
use tracing::{debug, warn};

use super::planner::{QueryPlan, QueryPlanner, ReadMode};
use super::postprocess::{apply_window, effective_order, sort_items};
use crate::catalog::ModelRegistry;
use crate::coerce::coerce_item;
use crate::config::ExecutorConfig;
use crate::error::Error;
use crate::store::{Cursor, StoreClient, StoreError};

/// Shared flag a caller sets to abandon an in-flight read.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-read deadline and cancellation, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct ReadContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl ReadContext {
    /// A context with no deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the read at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop the read `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abandon the read when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn check(&self, deadline: Option<Instant>, pages: usize) -> Result<(), Error> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Error::Cancelled { pages });
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded { pages });
        }
        Ok(())
    }
}

/// Records returned by a read, with what the caller needs to finish it.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// Sorted and windowed records.
    pub items: Vec<Item>,
    /// The request's `include` directive, untouched.
    pub include: Option<serde_json::Value>,
    /// Whether the store was read by key or scanned.
    pub mode: ReadMode,
    /// Pages fetched from the store.
    pub pages: usize,
}

/// Executes ORM reads against a store.
pub struct QueryExecutor<'a, S: StoreClient + ?Sized> {
    store: &'a S,
    registry: &'a ModelRegistry,
    config: ExecutorConfig,
}

impl<'a, S: StoreClient + ?Sized> QueryExecutor<'a, S> {
    /// Create an executor with the default configuration.
    pub fn new(store: &'a S, registry: &'a ModelRegistry) -> Self {
        Self {
            store,
            registry,
            config: ExecutorConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Plan a read without executing it.
    pub fn plan(&self, model: &str, where_clause: &WhereClause) -> Result<QueryPlan, Error> {
        let model = self.registry.get(model)?;
        QueryPlanner::new(&model).plan(where_clause)
    }

    /// Run a read and return the matching records in order.
    pub fn find(&self, model: &str, filter: &ReadFilter) -> Result<Vec<Item>, Error> {
        self.read(model, filter, &ReadContext::new())
            .map(|outcome| outcome.items)
    }

    /// Parse a loosely-typed ORM filter and run it.
    ///
    /// Malformed filters fail before the store is contacted.
    pub fn find_json(&self, model: &str, filter: &serde_json::Value) -> Result<ReadOutcome, Error> {
        let filter = ReadFilter::from_json(filter)?;
        self.read(model, &filter, &ReadContext::new())
    }

    /// The first record `find` would return.
    pub fn find_one(&self, model: &str, filter: &ReadFilter) -> Result<Option<Item>, Error> {
        let filter = filter.clone().with_limit(1);
        Ok(self.find(model, &filter)?.into_iter().next())
    }

    /// Number of records matching `where_clause`.
    pub fn count(&self, model: &str, where_clause: &WhereClause) -> Result<usize, Error> {
        let model_def = self.registry.get(model)?;
        let plan = QueryPlanner::new(&model_def).plan(where_clause)?;
        let (items, _) = self.fetch_all(&plan, &ReadContext::new())?;
        Ok(items.len())
    }

    /// Whether a record with the given key attribute values exists.
    pub fn exists(&self, model: &str, key: &Item) -> Result<bool, Error> {
        if key.is_empty() {
            return Err(Error::InvalidArgument(
                "exists requires at least one key attribute".into(),
            ));
        }
        let where_clause = key.iter().fold(WhereClause::new(), |clause, (name, value)| {
            clause.with(name.clone(), Condition::Equals(value.clone()))
        });
        Ok(self.find_one(model, &ReadFilter::new().with_where(where_clause))?.is_some())
    }

    /// Run a read under `ctx`.
    pub fn read(
        &self,
        model: &str,
        filter: &ReadFilter,
        ctx: &ReadContext,
    ) -> Result<ReadOutcome, Error> {
        let model_def = self.registry.get(model)?;
        let schema = &model_def.schema;
        let plan = QueryPlanner::new(&model_def).plan(&filter.where_clause)?;

        let (items, pages) = self.fetch_all(&plan, ctx)?;
        let fetched = items.len();
        let items: Vec<Item> = items
            .into_iter()
            .map(|item| coerce_item(item, schema))
            .collect();

        let order = effective_order(&filter.order, schema);
        let items = sort_items(items, &order, schema);
        let items = apply_window(items, filter.offset, filter.limit);

        debug!(
            model = %model_def.name,
            fetched,
            returned = items.len(),
            offset = ?filter.offset,
            limit = ?filter.limit,
            "read complete"
        );

        Ok(ReadOutcome {
            items,
            include: filter.include.clone(),
            mode: plan.mode,
            pages,
        })
    }

    /// Follow cursors until the store reports no more pages.
    fn fetch_all(&self, plan: &QueryPlan, ctx: &ReadContext) -> Result<(Vec<Item>, usize), Error> {
        let deadline = ctx
            .deadline
            .or_else(|| self.config.read_timeout.map(|t| Instant::now() + t));

        debug!(model = %plan.model, "{}", plan.describe());

        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut seen: HashSet<Cursor> = HashSet::new();
        let mut pages = 0usize;

        loop {
            ctx.check(deadline, pages)?;

            let result = match plan.targeted_read(cursor.as_ref()) {
                Some(request) => self.store.targeted_read(&request),
                None => self.store.full_scan(&plan.scan_request(cursor.as_ref())),
            };
            let page = result.map_err(|err| {
                warn!(
                    model = %plan.model,
                    table = %plan.table,
                    pages,
                    error = %err,
                    "store read failed"
                );
                match err {
                    StoreError::Timeout => Error::Timeout { pages },
                    other => Error::Store(other),
                }
            })?;
            pages += 1;

            debug!(
                model = %plan.model,
                page = pages,
                items = page.items.len(),
                cursor = ?page.cursor.as_ref().map(Cursor::to_string),
                "fetched page"
            );
            items.extend(page.items);

            let Some(next) = page.cursor else {
                break;
            };
            if !seen.insert(next.clone()) {
                return Err(Error::Protocol(format!(
                    "store returned cursor {next} twice while reading `{}`",
                    plan.table
                )));
            }
            if pages >= self.config.max_pages {
                return Err(Error::Protocol(format!(
                    "read of `{}` exceeded {} pages",
                    plan.table, self.config.max_pages
                )));
            }
            cursor = Some(next);
        }

        Ok((items, pages))
    }
}
