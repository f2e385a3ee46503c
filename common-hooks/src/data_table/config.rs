//! DataTable configuration.
//!
//! The data source decides the mode, and each mode carries only the fields
//! that make sense for it: in-memory rows with predicates and comparators
//! for [`ClientSource`], a query function for [`ServerSource`], and a
//! process function for [`ManualSource`]. Server and manual sources declare
//! filters and sorts by name, optionally with an externally applied value.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::QueryError;

use super::DataTable;
use super::query::{Direction, Mode, QueryConfig, QueryResult};

/// Search predicate: `(item, query) -> matches`.
pub type SearchFn<T> = Arc<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// Filter predicate: `(item, args) -> keep`.
pub type FilterFn<T> = Arc<dyn Fn(&T, &Value) -> bool + Send + Sync>;

/// Sort comparator: `(a, b, direction) -> ordering`.
pub type SortFn<T> = Arc<dyn Fn(&T, &T, Direction) -> Ordering + Send + Sync>;

/// Server query: produces one page for the given query snapshot.
pub type QueryFn<T> =
    Arc<dyn Fn(QueryConfig) -> BoxFuture<'static, Result<QueryResult<T>, QueryError>> + Send + Sync>;

/// Manual refresh: expected to push rows back with
/// [`DataTable::update_data_and_total_items`].
pub type ProcessFn<T> =
    Arc<dyn Fn(DataTable<T>) -> BoxFuture<'static, Result<(), QueryError>> + Send + Sync>;

fn upsert<V>(entries: &mut Vec<(String, V)>, name: String, value: V) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}

// =============================================================================
// Client
// =============================================================================

/// In-memory rows processed by the table itself.
///
/// # Example
///
/// ```
/// use common_hooks::data_table::{ClientSource, Direction};
///
/// #[derive(Clone)]
/// struct User { name: String, age: u32 }
///
/// let source = ClientSource::new(Vec::<User>::new())
///     .search_with(|u: &User, q: &str| u.name.contains(q))
///     .filter("isAdult", |u: &User, args: &serde_json::Value| {
///         args.as_bool().is_none_or(|adult| (u.age >= 18) == adult)
///     })
///     .sort("age", |a: &User, b: &User, dir: Direction| match dir {
///         Direction::Asc => a.age.cmp(&b.age),
///         Direction::Desc => b.age.cmp(&a.age),
///     });
/// ```
pub struct ClientSource<T> {
    pub(crate) initial: Vec<T>,
    pub(crate) search_with: Option<SearchFn<T>>,
    pub(crate) filters: Vec<(String, FilterFn<T>)>,
    pub(crate) sorts: Vec<(String, SortFn<T>)>,
}

impl<T> ClientSource<T> {
    /// Creates a client source over `initial`.
    pub fn new(initial: Vec<T>) -> Self {
        Self {
            initial,
            search_with: None,
            filters: Vec::new(),
            sorts: Vec::new(),
        }
    }

    /// Set the search predicate. Without one, search matches every row.
    pub fn search_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        self.search_with = Some(Arc::new(f));
        self
    }

    /// Register a named filter predicate.
    pub fn filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T, &Value) -> bool + Send + Sync + 'static,
    {
        upsert(&mut self.filters, name.into(), Arc::new(f) as FilterFn<T>);
        self
    }

    /// Register a named sort comparator.
    pub fn sort<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T, &T, Direction) -> Ordering + Send + Sync + 'static,
    {
        upsert(&mut self.sorts, name.into(), Arc::new(f) as SortFn<T>);
        self
    }
}

// =============================================================================
// Server / Manual
// =============================================================================

/// Filters and sorts applied outside of the table, declared by name.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExternalRules {
    pub filters: Vec<(String, Option<Value>)>,
    pub sorts: Vec<(String, Option<Direction>)>,
}

/// Rows fetched by a query function whenever the query changes.
///
/// # Example
///
/// ```
/// use common_hooks::data_table::{Direction, QueryResult, ServerSource};
///
/// let source = ServerSource::new(|config| async move {
///     let rows: Vec<u32> = (1..=100).skip(config.offset()).take(config.limit).collect();
///     Ok(QueryResult::new(rows, 100))
/// })
/// .filter_value("isAdult", true)
/// .sort_direction("createdAt", Direction::Desc);
/// ```
pub struct ServerSource<T> {
    pub(crate) query: QueryFn<T>,
    pub(crate) total_items: usize,
    pub(crate) rules: ExternalRules,
    pub(crate) latest_only: bool,
}

impl<T> ServerSource<T> {
    /// Creates a server source around `query`.
    pub fn new<F, Fut>(query: F) -> Self
    where
        T: 'static,
        F: Fn(QueryConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<QueryResult<T>, QueryError>> + Send + 'static,
    {
        Self {
            query: Arc::new(
                move |config: QueryConfig| -> BoxFuture<'static, Result<QueryResult<T>, QueryError>> {
                    Box::pin(query(config))
                },
            ),
            total_items: 0,
            rules: ExternalRules::default(),
            latest_only: false,
        }
    }

    /// Row count to report until the first query resolves.
    pub fn total_items(mut self, total_items: usize) -> Self {
        self.total_items = total_items;
        self
    }

    /// Declare a filter applied by the server.
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        upsert(&mut self.rules.filters, name.into(), None);
        self
    }

    /// Declare a filter together with its currently applied value.
    pub fn filter_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        upsert(&mut self.rules.filters, name.into(), Some(value.into()));
        self
    }

    /// Declare a sort key.
    pub fn sort(mut self, name: impl Into<String>) -> Self {
        upsert(&mut self.rules.sorts, name.into(), None);
        self
    }

    /// Declare a sort key that is currently applied in `direction`.
    pub fn sort_direction(mut self, name: impl Into<String>, direction: Direction) -> Self {
        upsert(&mut self.rules.sorts, name.into(), Some(direction));
        self
    }

    /// Drop query results that resolve after a newer query was issued.
    ///
    /// Off by default, in which case the last result to resolve wins.
    pub fn latest_only(mut self) -> Self {
        self.latest_only = true;
        self
    }
}

/// Rows held and refreshed by the caller.
///
/// After every command the table calls the process function with a handle
/// to itself; the function is expected to load rows for
/// [`DataTable::get_config`] and hand them back through
/// [`DataTable::update_data_and_total_items`].
pub struct ManualSource<T> {
    pub(crate) initial: Vec<T>,
    pub(crate) total_items: Option<usize>,
    pub(crate) process: ProcessFn<T>,
    pub(crate) rules: ExternalRules,
}

impl<T> ManualSource<T> {
    /// Creates a manual source with the first page of rows and a process function.
    pub fn new<F, Fut>(initial: Vec<T>, process: F) -> Self
    where
        T: 'static,
        F: Fn(DataTable<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), QueryError>> + Send + 'static,
    {
        Self {
            initial,
            total_items: None,
            process: Arc::new(
                move |table: DataTable<T>| -> BoxFuture<'static, Result<(), QueryError>> {
                    Box::pin(process(table))
                },
            ),
            rules: ExternalRules::default(),
        }
    }

    /// Authoritative row count across all pages.
    ///
    /// Defaults to the length of the initial rows.
    pub fn total_items(mut self, total_items: usize) -> Self {
        self.total_items = Some(total_items);
        self
    }

    /// Declare a filter applied by the process function.
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        upsert(&mut self.rules.filters, name.into(), None);
        self
    }

    /// Declare a filter together with its currently applied value.
    pub fn filter_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        upsert(&mut self.rules.filters, name.into(), Some(value.into()));
        self
    }

    /// Declare a sort key.
    pub fn sort(mut self, name: impl Into<String>) -> Self {
        upsert(&mut self.rules.sorts, name.into(), None);
        self
    }

    /// Declare a sort key that is currently applied in `direction`.
    pub fn sort_direction(mut self, name: impl Into<String>, direction: Direction) -> Self {
        upsert(&mut self.rules.sorts, name.into(), Some(direction));
        self
    }
}

// =============================================================================
// Source / Config
// =============================================================================

/// Where the rows come from. Fixes the table's [`Mode`].
pub enum Source<T> {
    Client(ClientSource<T>),
    Server(ServerSource<T>),
    Manual(ManualSource<T>),
}

impl<T> Source<T> {
    /// The mode this source runs the table in.
    pub fn mode(&self) -> Mode {
        match self {
            Self::Client(_) => Mode::Client,
            Self::Server(_) => Mode::Server,
            Self::Manual(_) => Mode::Manual,
        }
    }
}

impl<T> From<ClientSource<T>> for Source<T> {
    fn from(source: ClientSource<T>) -> Self {
        Self::Client(source)
    }
}

impl<T> From<ServerSource<T>> for Source<T> {
    fn from(source: ServerSource<T>) -> Self {
        Self::Server(source)
    }
}

impl<T> From<ManualSource<T>> for Source<T> {
    fn from(source: ManualSource<T>) -> Self {
        Self::Manual(source)
    }
}

impl<T> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(c) => f
                .debug_struct("Client")
                .field("initial", &c.initial.len())
                .field("filters", &c.filters.iter().map(|(n, _)| n).collect::<Vec<_>>())
                .field("sorts", &c.sorts.iter().map(|(n, _)| n).collect::<Vec<_>>())
                .finish(),
            Self::Server(s) => f
                .debug_struct("Server")
                .field("total_items", &s.total_items)
                .field("rules", &s.rules)
                .field("latest_only", &s.latest_only)
                .finish(),
            Self::Manual(m) => f
                .debug_struct("Manual")
                .field("initial", &m.initial.len())
                .field("total_items", &m.total_items)
                .field("rules", &m.rules)
                .finish(),
        }
    }
}

/// Configuration for a [`DataTable`].
///
/// # Example
///
/// ```
/// use common_hooks::data_table::{ClientSource, DataTable, DataTableConfig};
///
/// let table = DataTable::new(
///     DataTableConfig::new(ClientSource::new((1..=25).collect::<Vec<u32>>()))
///         .per_page(5)
///         .page(2),
/// );
/// assert_eq!(table.data(), vec![6, 7, 8, 9, 10]);
/// ```
#[derive(Debug)]
pub struct DataTableConfig<T> {
    pub(crate) per_page: usize,
    pub(crate) page: usize,
    pub(crate) search: String,
    pub(crate) source: Source<T>,
}

impl<T> DataTableConfig<T> {
    /// Creates a config with default page size (10), page (1) and no search.
    pub fn new(source: impl Into<Source<T>>) -> Self {
        Self {
            per_page: 10,
            page: 1,
            search: String::new(),
            source: source.into(),
        }
    }

    /// Set the page size. Zero is raised to one.
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Set the initial page. Zero is raised to one.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Set the initial search string.
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// The mode selected by the source.
    pub fn mode(&self) -> Mode {
        self.source.mode()
    }
}
