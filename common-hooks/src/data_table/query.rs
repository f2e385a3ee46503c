//! Query state shared between the table and whatever produces its rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where filtering, sorting and pagination happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rows are held in memory and processed by the table.
    Client,
    /// Rows are fetched by a query function whenever the query changes.
    Server,
    /// Rows are pushed in by a caller-supplied process function.
    Manual,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

impl Direction {
    /// The opposite direction.
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Active filter arguments keyed by filter name.
pub type FilterMap = BTreeMap<String, Value>;

/// The sort currently applied to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSort {
    /// Sort name, `None` when unsorted.
    pub column: Option<String>,
    /// Direction, `None` until a sort has been chosen.
    pub direction: Option<Direction>,
}

impl AppliedSort {
    /// A sort on `column` in `direction`.
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: Some(column.into()),
            direction: Some(direction),
        }
    }

    /// Returns `true` if a column is set.
    pub fn is_set(&self) -> bool {
        self.column.is_some()
    }
}

/// Snapshot of everything an external query needs to produce a page.
///
/// # Example
///
/// ```
/// use common_hooks::data_table::QueryConfig;
///
/// let config = QueryConfig::default();
/// assert_eq!(config.page, 1);
/// assert_eq!(config.limit, 10);
/// assert_eq!(config.offset(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Current search string.
    pub search: String,
    /// Current page, 1-based.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Applied filters.
    pub filter: FilterMap,
    /// Applied sort.
    pub sort: AppliedSort,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search: String::new(),
            page: 1,
            limit: 10,
            filter: FilterMap::new(),
            sort: AppliedSort::default(),
        }
    }
}

impl QueryConfig {
    /// Index of the first row of the requested page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// One page of rows together with the total row count.
///
/// The two are always replaced together so a page never pairs with a stale
/// count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    /// The rows of the current page.
    pub items: Vec<T>,
    /// Authoritative number of rows across all pages.
    pub total_items: usize,
}

impl<T> QueryResult<T> {
    /// Creates a new result.
    pub fn new(items: Vec<T>, total_items: usize) -> Self {
        Self { items, total_items }
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 0)
    }
}
