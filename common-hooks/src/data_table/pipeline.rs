//! Client-side filter, sort and paginate pipeline.

use super::config::{FilterFn, SearchFn, SortFn};
use super::query::{AppliedSort, FilterMap, QueryResult};

/// Predicates and comparators of a client-mode table.
pub(crate) struct ClientRules<T> {
    pub search_with: Option<SearchFn<T>>,
    pub filters: Vec<(String, FilterFn<T>)>,
    pub sorts: Vec<(String, SortFn<T>)>,
}

impl<T> ClientRules<T> {
    fn filter(&self, name: &str) -> Option<&FilterFn<T>> {
        self.filters.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    fn sort(&self, name: &str) -> Option<&SortFn<T>> {
        self.sorts.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }
}

/// The reactive inputs of one pipeline run.
pub(crate) struct PipelineInput<'a> {
    pub search: &'a str,
    pub filter: &'a FilterMap,
    pub sort: &'a AppliedSort,
    pub page: usize,
    pub per_page: usize,
}

/// Filter, then sort, then slice out the current page.
///
/// The reported total is the filtered count, before slicing. When the
/// filtered rows fit on one page they are returned whole, whatever the
/// current page is.
pub(crate) fn process<T: Clone>(
    items: &[T],
    rules: &ClientRules<T>,
    input: &PipelineInput<'_>,
) -> QueryResult<T> {
    if items.is_empty() {
        return QueryResult::default();
    }

    let mut rows: Vec<&T> = items
        .iter()
        .filter(|item: &&T| {
            let searched = rules
                .search_with
                .as_ref()
                .is_none_or(|search_with| search_with(*item, input.search));
            // Filters with no registered predicate never reject.
            searched
                && input.filter.iter().all(|(name, args)| {
                    rules
                        .filter(name)
                        .is_none_or(|predicate| predicate(*item, args))
                })
        })
        .collect();

    if let Some(column) = input.sort.column.as_deref()
        && let Some(compare) = rules.sort(column)
    {
        let direction = input.sort.direction.unwrap_or_default();
        // `sort_by` is stable: ties keep their filtered order.
        rows.sort_by(|a, b| compare(*a, *b, direction));
    }

    let total_items = rows.len();
    let per_page = input.per_page.max(1);
    let page_rows: Vec<T> = if total_items > per_page {
        let start = input.page.saturating_sub(1).saturating_mul(per_page);
        rows.into_iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect()
    } else {
        rows.into_iter().cloned().collect()
    };

    QueryResult::new(page_rows, total_items)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::data_table::query::Direction;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        group: u32,
    }

    fn rows(groups: &[u32]) -> Vec<Row> {
        groups
            .iter()
            .enumerate()
            .map(|(i, &group)| Row {
                id: i as u32 + 1,
                group,
            })
            .collect()
    }

    fn rules() -> ClientRules<Row> {
        let by_group: SortFn<Row> = Arc::new(|a: &Row, b: &Row, dir: Direction| {
            let ord = a.group.cmp(&b.group);
            if dir == Direction::Desc { ord.reverse() } else { ord }
        });
        let min_group: FilterFn<Row> =
            Arc::new(|row: &Row, args: &Value| args.as_u64().is_none_or(|min| row.group as u64 >= min));
        ClientRules {
            search_with: None,
            filters: vec![("min_group".into(), min_group)],
            sorts: vec![("group".into(), by_group)],
        }
    }

    fn run(
        items: &[Row],
        filter: &FilterMap,
        sort: &AppliedSort,
        page: usize,
        per_page: usize,
    ) -> QueryResult<Row> {
        let input = PipelineInput {
            search: "",
            filter,
            sort,
            page,
            per_page,
        };
        process(items, &rules(), &input)
    }

    fn ids(result: &QueryResult<Row>) -> Vec<u32> {
        result.items.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_empty_input() {
        let result = run(&[], &FilterMap::new(), &AppliedSort::default(), 1, 10);
        assert!(result.items.is_empty());
        assert_eq!(result.total_items, 0);
    }

    #[test]
    fn test_sort_is_stable() {
        let items = rows(&[2, 1, 2, 1, 2]);
        let sort = AppliedSort::new("group", Direction::Asc);
        let result = run(&items, &FilterMap::new(), &sort, 1, 10);
        assert_eq!(ids(&result), vec![2, 4, 1, 3, 5]);

        let sort = AppliedSort::new("group", Direction::Desc);
        let result = run(&items, &FilterMap::new(), &sort, 1, 10);
        assert_eq!(ids(&result), vec![1, 3, 5, 2, 4]);
    }

    #[test]
    fn test_unknown_sort_and_filter_are_ignored() {
        let items = rows(&[3, 1, 2]);
        let mut filter = FilterMap::new();
        filter.insert("missing".into(), json!(true));
        let sort = AppliedSort::new("missing", Direction::Asc);
        let result = run(&items, &filter, &sort, 1, 10);
        assert_eq!(ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_total_counts_filtered_rows_before_slicing() {
        let items = rows(&[1, 2, 3, 4, 5, 6, 7]);
        let mut filter = FilterMap::new();
        filter.insert("min_group".into(), json!(3));
        let result = run(&items, &filter, &AppliedSort::default(), 2, 2);
        assert_eq!(result.total_items, 5);
        assert_eq!(ids(&result), vec![5, 6]);
    }

    #[test]
    fn test_small_result_ignores_page() {
        let items = rows(&[1, 2, 3]);
        let result = run(&items, &FilterMap::new(), &AppliedSort::default(), 4, 10);
        assert_eq!(ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_page_past_end_is_empty_when_sliced() {
        let items = rows(&[1, 2, 3, 4, 5]);
        let result = run(&items, &FilterMap::new(), &AppliedSort::default(), 9, 2);
        assert!(result.items.is_empty());
        assert_eq!(result.total_items, 5);
    }
}
