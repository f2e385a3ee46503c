//! Ready-made search predicates for [`ClientSource::search_with`].
//!
//! [`ClientSource::search_with`]: super::ClientSource::search_with

use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};

/// Fuzzy match the query against a label extracted from each row.
///
/// Uses nucleo-matcher with case-insensitive, smart-normalized fuzzy atoms.
/// An empty query matches every row.
///
/// # Example
///
/// ```
/// use common_hooks::data_table::search;
///
/// let matches = search::fuzzy(|name: &String| name.clone());
/// assert!(matches(&"apricot".to_string(), "ap"));
/// assert!(!matches(&"banana".to_string(), "ap"));
/// ```
pub fn fuzzy<T, L>(label: L) -> impl Fn(&T, &str) -> bool + Send + Sync + 'static
where
    T: 'static,
    L: Fn(&T) -> String + Send + Sync + 'static,
{
    move |item: &T, query: &str| {
        if query.is_empty() {
            return true;
        }

        let mut matcher = Matcher::new(Config::DEFAULT);
        let pattern = Pattern::new(
            query,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );

        let text = label(item);
        let mut buf = Vec::new();
        pattern
            .score(Utf32Str::new(&text, &mut buf), &mut matcher)
            .is_some()
    }
}

/// Case-insensitive substring match against a label extracted from each row.
pub fn contains<T, L>(label: L) -> impl Fn(&T, &str) -> bool + Send + Sync + 'static
where
    T: 'static,
    L: Fn(&T) -> String + Send + Sync + 'static,
{
    move |item: &T, query: &str| {
        query.is_empty() || label(item).to_lowercase().contains(&query.to_lowercase())
    }
}
