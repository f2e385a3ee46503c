//! Paginated, filterable, sortable table state.
//!
//! A [`DataTable`] owns the page, page size, search, filter and sort state
//! of one table and keeps the visible rows consistent with it. Where the
//! rows come from is fixed by the configured [`Source`]:
//!
//! - **Client**: rows live in memory and are filtered, sorted and sliced by
//!   the table on read.
//! - **Server**: a query function is re-run whenever the query changes.
//! - **Manual**: the caller's process function runs after every command and
//!   pushes rows back with [`DataTable::update_data_and_total_items`].
//!
//! # Example
//!
//! ```
//! use common_hooks::data_table::{ClientSource, DataTable, DataTableConfig, FilterOptions};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User { id: u32, age: u32 }
//!
//! let users = vec![User { id: 1, age: 17 }, User { id: 2, age: 25 }, User { id: 3, age: 30 }];
//! let table = DataTable::new(DataTableConfig::new(
//!     ClientSource::new(users).filter("isAdult", |u: &User, args: &serde_json::Value| {
//!         args.as_bool().is_none_or(|adult| (u.age >= 18) == adult)
//!     }),
//! ));
//!
//! table.filter_by("isAdult", true, FilterOptions::immediate());
//! assert_eq!(table.total_items(), 2);
//! assert_eq!(table.data()[0].id, 2);
//! ```

mod config;
mod pagination;
mod pipeline;
mod query;
pub mod search;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use log::{debug, error, warn};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::QueryError;
use crate::reactive::{Effect, Memo, Tracked, batch};
use crate::state::State;

pub use config::{
    ClientSource, DataTableConfig, FilterFn, ManualSource, ProcessFn, QueryFn, SearchFn,
    ServerSource, SortFn, Source,
};
pub use pagination::Pagination;
pub use query::{AppliedSort, Direction, FilterMap, Mode, QueryConfig, QueryResult};

use config::ExternalRules;
use pipeline::{ClientRules, PipelineInput};

/// Options for [`DataTable::filter_by`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Apply the filter right away instead of staging it as pending.
    pub immediate: bool,
    /// Go back to the first page.
    pub reset_page: bool,
    /// Clear the search string.
    pub reset_search: bool,
}

impl FilterOptions {
    /// Stage the filter as pending (the default).
    pub fn pending() -> Self {
        Self::default()
    }

    /// Apply the filter right away.
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    /// Also go back to the first page.
    pub fn reset_page(mut self) -> Self {
        self.reset_page = true;
        self
    }

    /// Also clear the search string.
    pub fn reset_search(mut self) -> Self {
        self.reset_search = true;
        self
    }
}

/// How the table turns its state into rows.
enum Driver<T> {
    Client(Arc<ClientRules<T>>),
    Server {
        query: QueryFn<T>,
        latest_only: bool,
    },
    Manual(ProcessFn<T>),
}

struct Inner<T> {
    mode: Mode,
    driver: Driver<T>,
    default_per_page: usize,
    filter_keys: Vec<String>,
    sort_keys: Vec<String>,

    /// Client mode only: the rows fed to the pipeline.
    initial_items: State<Arc<Vec<T>>>,
    applied_filter: State<FilterMap>,
    pending_filter: State<FilterMap>,
    applied_sort: State<AppliedSort>,
    per_page: State<usize>,
    current_page: State<usize>,
    search: State<String>,
    processing: State<bool>,
    raw: State<QueryResult<T>>,
    last_error: State<Option<QueryError>>,

    /// Client mode only: the pipeline output.
    processed: Option<Memo<QueryResult<T>>>,
    /// Server mode only: re-queries when the query changes.
    refresh: OnceLock<Effect>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    in_flight: AtomicUsize,
    issued: AtomicU64,
}

/// Reactive state of one data table.
///
/// `DataTable<T>` is a cheap handle: clones share the same state. Commands
/// never fail; requests the table cannot honor (out-of-range navigation,
/// filtering without configured filters) are ignored and logged.
pub struct DataTable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DataTable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> DataTable<T> {
    /// Create a table from its configuration.
    ///
    /// Never blocks: in server mode the first query is spawned onto the
    /// current tokio runtime by the refresh effect.
    pub fn new(config: DataTableConfig<T>) -> Self {
        let DataTableConfig {
            per_page,
            page,
            search,
            source,
        } = config;
        let mode = source.mode();

        let mut applied_filter = FilterMap::new();
        let mut applied_sort = AppliedSort::default();

        // Client rows move into state here and manual rows straight into the
        // result; the retained driver keeps only the functions.
        let (driver, initial, raw, filter_keys, sort_keys) = match source {
            Source::Client(client) => {
                let filter_keys = client.filters.iter().map(|(n, _)| n.clone()).collect();
                let sort_keys = client.sorts.iter().map(|(n, _)| n.clone()).collect();
                let rules = ClientRules {
                    search_with: client.search_with,
                    filters: client.filters,
                    sorts: client.sorts,
                };
                (
                    Driver::Client(Arc::new(rules)),
                    client.initial,
                    QueryResult::default(),
                    filter_keys,
                    sort_keys,
                )
            }
            Source::Server(server) => {
                let (filter_keys, sort_keys) =
                    seed_external(&server.rules, &mut applied_filter, &mut applied_sort);
                (
                    Driver::Server {
                        query: server.query,
                        latest_only: server.latest_only,
                    },
                    Vec::new(),
                    QueryResult::new(Vec::new(), server.total_items),
                    filter_keys,
                    sort_keys,
                )
            }
            Source::Manual(manual) => {
                let (filter_keys, sort_keys) =
                    seed_external(&manual.rules, &mut applied_filter, &mut applied_sort);
                let total = manual.total_items.unwrap_or(manual.initial.len());
                (
                    Driver::Manual(manual.process),
                    Vec::new(),
                    QueryResult::new(manual.initial, total),
                    filter_keys,
                    sort_keys,
                )
            }
        };

        let initial_items = State::new(Arc::new(initial));
        let applied_filter_state = State::new(applied_filter.clone());
        let pending_filter = State::new(applied_filter);
        let applied_sort = State::new(applied_sort);
        let per_page_state = State::new(per_page);
        let current_page = State::new(page);
        let search = State::new(search);

        let processed = match &driver {
            Driver::Client(rules) => Some(client_memo(
                Arc::clone(rules),
                &initial_items,
                &applied_filter_state,
                &applied_sort,
                &search,
                &current_page,
                &per_page_state,
            )),
            _ => None,
        };

        let inner = Arc::new(Inner {
            mode,
            driver,
            default_per_page: per_page,
            filter_keys,
            sort_keys,
            initial_items,
            applied_filter: applied_filter_state,
            pending_filter,
            applied_sort,
            per_page: per_page_state,
            current_page,
            search,
            processing: State::new(false),
            raw: State::new(raw),
            last_error: State::new(None),
            processed,
            refresh: OnceLock::new(),
            debounce: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            issued: AtomicU64::new(0),
        });

        if mode == Mode::Server {
            let weak = Arc::downgrade(&inner);
            let effect = Effect::new(
                &[
                    &inner.current_page,
                    &inner.per_page,
                    &inner.search,
                    &inner.applied_filter,
                    &inner.applied_sort,
                ],
                move || {
                    if let Some(inner) = weak.upgrade() {
                        DataTable { inner }.fetch();
                    }
                },
            );
            let _ = inner.refresh.set(effect);
        }

        Self { inner }
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// Rows of the current page.
    pub fn data(&self) -> Vec<T> {
        self.with_result(|result| result.items.clone())
    }

    /// Rows of the current page together with the total, read at once.
    pub fn result(&self) -> QueryResult<T> {
        self.with_result(QueryResult::clone)
    }

    /// Borrow the current page and total without cloning.
    pub fn with_result<R>(&self, f: impl FnOnce(&QueryResult<T>) -> R) -> R {
        match &self.inner.processed {
            Some(memo) => memo.with(f),
            None => self.inner.raw.with(f),
        }
    }

    /// Total rows across all pages (after search and filters in client mode).
    pub fn total_items(&self) -> usize {
        self.with_result(|result| result.total_items)
    }

    /// Pagination view of the current state.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.current_page(), self.per_page(), self.total_items())
    }

    pub fn total_pages(&self) -> usize {
        self.pagination().total_pages()
    }

    pub fn page_list(&self) -> Vec<usize> {
        self.pagination().page_list()
    }

    pub fn can_go_next(&self) -> bool {
        self.pagination().can_go_next()
    }

    pub fn can_go_previous(&self) -> bool {
        self.pagination().can_go_previous()
    }

    pub fn showing_from(&self) -> usize {
        self.pagination().showing_from()
    }

    pub fn showing_to(&self) -> usize {
        self.pagination().showing_to()
    }

    /// Whether a search, sort or filter is active.
    pub fn has_interacted(&self) -> bool {
        !self.inner.search.with(String::is_empty)
            || self.inner.applied_sort.with(AppliedSort::is_set)
            || !self.inner.applied_filter.with(FilterMap::is_empty)
    }

    // =========================================================================
    // Plain state
    // =========================================================================

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn per_page(&self) -> usize {
        self.inner.per_page.get()
    }

    pub fn current_page(&self) -> usize {
        self.inner.current_page.get()
    }

    pub fn search(&self) -> String {
        self.inner.search.get()
    }

    pub fn applied_filter(&self) -> FilterMap {
        self.inner.applied_filter.get()
    }

    pub fn pending_filter(&self) -> FilterMap {
        self.inner.pending_filter.get()
    }

    pub fn applied_sort(&self) -> AppliedSort {
        self.inner.applied_sort.get()
    }

    /// `true` while a server query or manual process call is in flight.
    pub fn processing(&self) -> bool {
        self.inner.processing.get()
    }

    /// The error of the last failed refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<QueryError> {
        self.inner.last_error.get()
    }

    /// Configured sort names, in configuration order.
    pub fn sort_keys(&self) -> &[String] {
        &self.inner.sort_keys
    }

    /// Configured filter names, in configuration order.
    pub fn filter_keys(&self) -> &[String] {
        &self.inner.filter_keys
    }

    /// Snapshot of the query for an external data source.
    pub fn get_config(&self) -> QueryConfig {
        QueryConfig {
            search: self.inner.search.get(),
            page: self.inner.current_page.get(),
            limit: self.inner.per_page.get(),
            filter: self.inner.applied_filter.get(),
            sort: self.inner.applied_sort.get(),
        }
    }

    /// Run `listener` now and after every change to the table's state.
    ///
    /// The listener stays registered until the returned effect is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = &self.inner;
        Effect::new(
            &[
                &inner.initial_items,
                &inner.applied_filter,
                &inner.pending_filter,
                &inner.applied_sort,
                &inner.per_page,
                &inner.current_page,
                &inner.search,
                &inner.processing,
                &inner.raw,
                &inner.last_error,
            ],
            listener,
        )
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Set the search string and go back to the first page.
    ///
    /// Cancels a pending [`set_search_debounced`](Self::set_search_debounced).
    pub fn set_search(&self, value: impl Into<String>) {
        self.set_search_debounced(value, Duration::ZERO);
    }

    /// Set the search string after `delay`.
    ///
    /// A new call within the delay cancels the previous one, so only the last
    /// value of a burst is applied.
    pub fn set_search_debounced(&self, value: impl Into<String>, delay: Duration) {
        let value = value.into();
        let mut pending = self
            .inner
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        if delay.is_zero() {
            drop(pending);
            self.apply_search(value);
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let table = self.clone();
                *pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    table.apply_search(value);
                }));
            }
            Err(_) => {
                warn!("DataTable: no tokio runtime for debounced search, applying immediately");
                drop(pending);
                self.apply_search(value);
            }
        }
    }

    fn apply_search(&self, value: String) {
        batch(|| {
            self.inner.search.set(value);
            self.inner.current_page.set(1);
        });
        self.process_update();
    }

    /// Filter by a configured filter.
    ///
    /// The value is staged as pending unless `options.immediate` is set, in
    /// which case it is applied directly. Ignored when no filters are
    /// configured.
    pub fn filter_by(&self, key: impl Into<String>, args: impl Into<Value>, options: FilterOptions) {
        let key = key.into();
        if self.inner.filter_keys.is_empty() {
            warn!("DataTable: filter_by('{}') ignored, no filters configured", key);
            return;
        }
        let args = args.into();
        batch(|| {
            let target = if options.immediate {
                &self.inner.applied_filter
            } else {
                &self.inner.pending_filter
            };
            target.update(|filters| {
                filters.insert(key, args);
            });
            if options.reset_page {
                self.inner.current_page.set(1);
            }
            if options.reset_search {
                self.inner.search.set(String::new());
            }
        });
        self.process_update();
    }

    /// Remove a filter from the pending filters, and from the applied ones
    /// too when `immediate`.
    pub fn remove_filter(&self, key: &str, immediate: bool) {
        batch(|| {
            self.inner.pending_filter.update(|filters| {
                filters.remove(key);
            });
            if immediate {
                self.inner.applied_filter.update(|filters| {
                    filters.remove(key);
                });
            }
        });
        self.process_update();
    }

    /// Clear both pending and applied filters.
    pub fn clear_filters(&self) {
        batch(|| {
            self.inner.applied_filter.set(FilterMap::new());
            self.inner.pending_filter.set(FilterMap::new());
        });
        self.process_update();
    }

    /// Replace the applied filters with a snapshot of the pending ones.
    pub fn apply_pending_filter(&self) {
        let snapshot = self.inner.pending_filter.get();
        self.inner.applied_filter.set(snapshot);
        self.process_update();
    }

    /// Sort by `column`.
    ///
    /// Without a direction, sorting the current column again flips its
    /// direction and a new column starts ascending. Asking for the direction
    /// that is already applied does nothing.
    pub fn sort_by(&self, column: impl Into<String>, direction: Option<Direction>) {
        let column = column.into();
        let current = self.inner.applied_sort.get();
        let same_column = current.column.as_deref() == Some(column.as_str());

        let direction = match direction {
            Some(direction) if same_column && current.direction == Some(direction) => {
                debug!("DataTable: sort '{}' {:?} already applied", column, direction);
                return;
            }
            Some(direction) => direction,
            None if same_column => current.direction.unwrap_or_default().toggled(),
            None => Direction::Asc,
        };

        self.inner
            .applied_sort
            .set(AppliedSort::new(column, direction));
        self.process_update();
    }

    /// Remove the applied sort.
    pub fn remove_sort(&self) {
        self.inner.applied_sort.set(AppliedSort::default());
        self.process_update();
    }

    pub fn next_page(&self) {
        if !self.can_go_next() {
            debug!("DataTable: next_page ignored on last page");
            return;
        }
        self.inner.current_page.update(|page| *page += 1);
        self.process_update();
    }

    pub fn previous_page(&self) {
        if !self.can_go_previous() {
            debug!("DataTable: previous_page ignored on first page");
            return;
        }
        self.inner.current_page.update(|page| *page -= 1);
        self.process_update();
    }

    /// Jump to `page`.
    ///
    /// Only pages strictly between the first and the last are accepted; the
    /// first and last page are reached with [`previous_page`](Self::previous_page)
    /// and [`next_page`](Self::next_page).
    pub fn goto_page(&self, page: usize) {
        if !self.pagination().accepts_goto(page) {
            debug!("DataTable: goto_page({}) ignored", page);
            return;
        }
        self.inner.current_page.set(page);
        self.process_update();
    }

    /// Change the page size and go back to the first page. Zero is raised to one.
    pub fn set_per_page(&self, per_page: usize) {
        batch(|| {
            self.inner.per_page.set(per_page.max(1));
            self.inner.current_page.set(1);
        });
        self.process_update();
    }

    /// Clear applied filters, sort and search, and restore the configured
    /// page size on the first page.
    pub fn reset(&self) {
        batch(|| {
            self.inner.applied_filter.set(FilterMap::new());
            self.inner.applied_sort.set(AppliedSort::default());
            self.inner.current_page.set(1);
            self.inner.per_page.set(self.inner.default_per_page);
            self.inner.search.set(String::new());
        });
        self.process_update();
    }

    /// Replace the rows and the total together.
    ///
    /// For server and manual producers; client tables derive their rows
    /// and ignore this.
    pub fn update_data_and_total_items(&self, items: Vec<T>, total_items: usize) {
        if self.inner.mode == Mode::Client {
            warn!("DataTable: update_data_and_total_items ignored in client mode");
            return;
        }
        self.inner.raw.set(QueryResult::new(items, total_items));
    }

    /// Replace the in-memory rows of a client table.
    pub fn hydrate(&self, items: Vec<T>) {
        if self.inner.mode != Mode::Client {
            debug!("DataTable: hydrate ignored in {:?} mode", self.inner.mode);
            return;
        }
        self.inner.initial_items.set(Arc::new(items));
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Runs after every command. Client tables recompute lazily on read and
    /// server tables are driven by the refresh effect, so only manual tables
    /// do work here.
    fn process_update(&self) {
        if let Driver::Manual(process) = &self.inner.driver {
            let Ok(runtime) = Handle::try_current() else {
                warn!("DataTable: no tokio runtime, manual process skipped");
                return;
            };
            self.begin_refresh();
            let fut = process(self.clone());
            let table = self.clone();
            runtime.spawn(async move {
                let result = fut.await;
                table.finish_refresh(result.err());
            });
        }
    }

    fn fetch(&self) {
        let Driver::Server { query, latest_only } = &self.inner.driver else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            warn!("DataTable: no tokio runtime, server query skipped");
            return;
        };

        let config = self.get_config();
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("DataTable: query #{} issued for {:?}", seq, config);

        self.begin_refresh();
        let fut = query(config);
        let latest_only = *latest_only;
        let table = self.clone();
        runtime.spawn(async move {
            let result = fut.await;
            if latest_only && seq != table.inner.issued.load(Ordering::SeqCst) {
                debug!("DataTable: query #{} superseded, result dropped", seq);
                table.end_refresh();
                return;
            }
            match result {
                Ok(page) => {
                    debug!(
                        "DataTable: query #{} resolved with {} of {} rows",
                        seq,
                        page.items.len(),
                        page.total_items
                    );
                    table.inner.raw.set(page);
                    table.finish_refresh(None);
                }
                Err(err) => table.finish_refresh(Some(err)),
            }
        });
    }

    fn begin_refresh(&self) {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.processing.set(true);
    }

    fn finish_refresh(&self, err: Option<QueryError>) {
        match err {
            Some(err) => {
                error!("DataTable: refresh failed: {}", err);
                self.inner.last_error.set(Some(err));
            }
            None => {
                if self.inner.last_error.with(Option::is_some) {
                    self.inner.last_error.set(None);
                }
            }
        }
        self.end_refresh();
    }

    fn end_refresh(&self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.processing.set(false);
        }
    }
}

impl<T> std::fmt::Debug for DataTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTable")
            .field("mode", &self.inner.mode)
            .field("current_page", &self.inner.current_page.get())
            .field("per_page", &self.inner.per_page.get())
            .field("search", &self.inner.search.get())
            .field("applied_filter", &self.inner.applied_filter.get())
            .field("applied_sort", &self.inner.applied_sort.get())
            .finish_non_exhaustive()
    }
}

/// Declared filter and sort names of a server or manual source, seeding the
/// applied state from the literal values. The first sort with a direction
/// wins.
fn seed_external(
    rules: &ExternalRules,
    applied_filter: &mut FilterMap,
    applied_sort: &mut AppliedSort,
) -> (Vec<String>, Vec<String>) {
    for (name, value) in &rules.filters {
        if let Some(value) = value {
            applied_filter.insert(name.clone(), value.clone());
        }
    }
    if let Some((name, Some(direction))) = rules.sorts.iter().find(|(_, dir)| dir.is_some()) {
        *applied_sort = AppliedSort::new(name.clone(), *direction);
    }
    (
        rules.filters.iter().map(|(n, _)| n.clone()).collect(),
        rules.sorts.iter().map(|(n, _)| n.clone()).collect(),
    )
}

fn client_memo<T: Clone + Send + Sync + 'static>(
    rules: Arc<ClientRules<T>>,
    items: &State<Arc<Vec<T>>>,
    filter: &State<FilterMap>,
    sort: &State<AppliedSort>,
    search: &State<String>,
    page: &State<usize>,
    per_page: &State<usize>,
) -> Memo<QueryResult<T>> {
    let deps: [&dyn Tracked; 6] = [
        items,
        filter,
        sort,
        search,
        page,
        per_page,
    ];
    let (items, filter, sort, search, page, per_page) = (
        items.clone(),
        filter.clone(),
        sort.clone(),
        search.clone(),
        page.clone(),
        per_page.clone(),
    );
    Memo::new(&deps, move || {
        // Snapshots only: user predicates may write back to the table.
        let (items, filter, sort, search) = (items.get(), filter.get(), sort.get(), search.get());
        let input = PipelineInput {
            search: &search,
            filter: &filter,
            sort: &sort,
            page: page.get(),
            per_page: per_page.get(),
        };
        pipeline::process(items.as_slice(), &rules, &input)
    })
}
