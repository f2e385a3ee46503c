use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common_hooks::QueryError;
use common_hooks::data_table::{
    DataTable, DataTableConfig, Direction, FilterOptions, Mode, QueryConfig, QueryResult,
    ServerSource,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: u32,
    age: u32,
}

fn users() -> Vec<User> {
    (1..=100).map(|id| User { id, age: id % 40 + 5 }).collect()
}

/// Stand-in for a remote endpoint: filters, sorts and pages `users()`.
async fn fetch_users(config: QueryConfig) -> Result<QueryResult<User>, QueryError> {
    let mut rows = users();
    if let Some(adult) = config.filter.get("isAdult").and_then(|v| v.as_bool()) {
        rows.retain(|u| (u.age >= 18) == adult);
    }
    if config.sort.column.as_deref() == Some("age") {
        rows.sort_by_key(|u| u.age);
        if config.sort.direction == Some(Direction::Desc) {
            rows.reverse();
        }
    }
    let total = rows.len();
    let page = rows
        .into_iter()
        .skip(config.offset())
        .take(config.limit)
        .collect();
    Ok(QueryResult::new(page, total))
}

fn server_table() -> (DataTable<User>, Arc<Mutex<Vec<QueryConfig>>>) {
    let issued = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&issued);
    let source = ServerSource::new(move |config: QueryConfig| {
        log.lock().unwrap().push(config.clone());
        fetch_users(config)
    })
    .filter("isAdult")
    .sort("age");
    (DataTable::new(DataTableConfig::new(source)), issued)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_query_runs_after_construction() {
    let (table, issued) = server_table();

    assert_eq!(table.mode(), Mode::Server);
    assert_eq!(issued.lock().unwrap().len(), 1);
    assert!(table.processing());
    assert!(table.data().is_empty());

    settle().await;

    assert!(!table.processing());
    assert_eq!(table.total_items(), 100);
    assert_eq!(table.data().len(), 10);
    assert_eq!(table.data()[0].id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_query_follows_state_changes() {
    let (table, issued) = server_table();
    settle().await;

    table.filter_by("isAdult", true, FilterOptions::immediate());
    settle().await;
    let adults = users().iter().filter(|u| u.age >= 18).count();
    assert_eq!(table.total_items(), adults);
    assert!(table.data().iter().all(|u| u.age >= 18));

    table.sort_by("age", Some(Direction::Desc));
    settle().await;
    assert_eq!(table.data()[0].age, 44);

    table.next_page();
    settle().await;

    let last = issued.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.page, 2);
    assert_eq!(last.filter.get("isAdult"), Some(&json!(true)));
    assert_eq!(last.sort.direction, Some(Direction::Desc));
}

#[tokio::test(start_paused = true)]
async fn test_pending_filter_does_not_query() {
    let (table, issued) = server_table();
    settle().await;

    table.filter_by("isAdult", false, FilterOptions::pending());
    assert_eq!(issued.lock().unwrap().len(), 1);

    table.apply_pending_filter();
    assert_eq!(issued.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_one_query_per_command() {
    let (table, issued) = server_table();
    settle().await;

    // Writes per_page and current_page.
    table.set_per_page(25);
    assert_eq!(issued.lock().unwrap().len(), 2);

    // Writes five fields.
    table.reset();
    assert_eq!(issued.lock().unwrap().len(), 3);

    settle().await;
    assert_eq!(table.per_page(), 10);
    assert_eq!(table.data().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_slow_response_wins_by_default() {
    let source = ServerSource::new(|config: QueryConfig| async move {
        let delay = if config.search == "slow" { 100 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(QueryResult::new(vec![config.search.clone()], 1))
    });
    let table = DataTable::new(DataTableConfig::new(source));

    table.set_search("slow");
    table.set_search("fast");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(table.data(), vec!["slow".to_string()]);
    assert!(!table.processing());
}

#[tokio::test(start_paused = true)]
async fn test_latest_only_drops_stale_responses() {
    let source = ServerSource::new(|config: QueryConfig| async move {
        let delay = if config.search == "slow" { 100 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(QueryResult::new(vec![config.search.clone()], 1))
    })
    .latest_only();
    let table = DataTable::new(DataTableConfig::new(source));

    table.set_search("slow");
    table.set_search("fast");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(table.data(), vec!["fast".to_string()]);
    assert!(table.processing());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(table.data(), vec!["fast".to_string()]);
    assert!(!table.processing());
}

#[tokio::test(start_paused = true)]
async fn test_failed_query_keeps_previous_page() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let source = ServerSource::new(move |config: QueryConfig| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if config.search == "boom" {
                Err(QueryError::new("query failed"))
            } else {
                Ok(QueryResult::new(vec![1u32, 2, 3], 3))
            }
        }
    })
    .total_items(50);
    let table = DataTable::new(DataTableConfig::new(source));
    assert_eq!(table.total_items(), 50);
    settle().await;

    table.set_search("boom");
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(table.data(), vec![1, 2, 3]);
    assert_eq!(table.last_error(), Some(QueryError::new("query failed")));
    assert!(!table.processing());
}

#[tokio::test(start_paused = true)]
async fn test_literal_sort_is_sent_with_first_query() {
    let issued = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&issued);
    let source = ServerSource::new(move |config: QueryConfig| {
        log.lock().unwrap().push(config.clone());
        fetch_users(config)
    })
    .filter_value("isAdult", true)
    .sort_direction("age", Direction::Asc);
    let _table = DataTable::new(DataTableConfig::new(source));

    let first = issued.lock().unwrap()[0].clone();
    assert_eq!(first.filter.get("isAdult"), Some(&json!(true)));
    assert_eq!(first.sort.column.as_deref(), Some("age"));
}

#[test]
fn test_construction_without_runtime() {
    let (table, issued) = server_table();

    assert!(issued.lock().unwrap().is_empty());
    assert!(!table.processing());
    assert_eq!(table.total_items(), 0);
}
