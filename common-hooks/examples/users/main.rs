//! Drives client, server and manual tables over the same 100 users.
//!
//! Run with `cargo run -p common-hooks --example users`.

use std::cmp::Ordering;
use std::time::Duration;

use common_hooks::prelude::*;
use log::info;
use serde::Serialize;
use serde_json::Value;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: Uuid,
    name: String,
    email: String,
    age: u32,
    created_at: u64,
}

fn generate_users() -> Vec<User> {
    (1..=100)
        .map(|i| User {
            id: Uuid::new_v4(),
            name: format!("User {}", i),
            email: format!("user{}@example.com", i),
            age: (i * 7) % 60 + 10,
            created_at: 1_700_000_000 + (i as u64 * 86_400),
        })
        .collect()
}

fn is_adult(user: &User, args: &Value) -> bool {
    args.as_bool().is_some_and(|adult| (user.age >= 18) == adult)
}

fn by_created_at(a: &User, b: &User, dir: Direction) -> Ordering {
    match dir {
        Direction::Asc => a.created_at.cmp(&b.created_at),
        Direction::Desc => b.created_at.cmp(&a.created_at),
    }
}

fn print_page(label: &str, table: &DataTable<User>) {
    println!(
        "{} | page {}/{} | showing {}-{} of {}",
        label,
        table.current_page(),
        table.total_pages(),
        table.showing_from(),
        table.showing_to(),
        table.total_items()
    );
    for user in table.data() {
        println!("    {:<9} age {:>2}  {}", user.name, user.age, user.email);
    }
}

/// Simulated backend: filters, sorts and pages the dataset after a delay.
async fn query_users(config: QueryConfig) -> Result<QueryResult<User>, QueryError> {
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut rows: Vec<User> = generate_users()
        .into_iter()
        .filter(|u| u.name.to_lowercase().contains(&config.search.to_lowercase()))
        .filter(|u| {
            config
                .filter
                .get("isAdult")
                .is_none_or(|args| is_adult(u, args))
        })
        .collect();
    if config.sort.column.as_deref() == Some("createdAt") {
        let dir = config.sort.direction.unwrap_or_default();
        rows.sort_by(|a, b| by_created_at(a, b, dir));
    }

    let total = rows.len();
    let page = rows
        .into_iter()
        .skip(config.offset())
        .take(config.limit)
        .collect();
    Ok(QueryResult::new(page, total))
}

async fn client_demo() {
    let source = ClientSource::new(generate_users())
        .search_with(search::fuzzy(|u: &User| u.name.clone()))
        .filter("isAdult", is_adult)
        .sort("createdAt", by_created_at);
    let table = DataTable::new(DataTableConfig::new(source).per_page(5));

    table.filter_by("isAdult", true, FilterOptions::immediate());
    table.sort_by("createdAt", Some(Direction::Desc));
    print_page("client, adults by newest", &table);

    table.set_search_debounced("user 4", Duration::from_millis(300));
    tokio::time::sleep(Duration::from_millis(350)).await;
    print_page("client, search 'user 4'", &table);
}

async fn server_demo() {
    let source = ServerSource::new(query_users)
        .filter_value("isAdult", true)
        .sort_direction("createdAt", Direction::Asc)
        .latest_only();
    let table = DataTable::new(DataTableConfig::new(source).per_page(5));
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_page("server, first page", &table);

    table.next_page();
    table.next_page();
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_page("server, after two pages", &table);
    info!("last query: {:?}", table.get_config());
}

async fn manual_demo() {
    let source = ManualSource::new(Vec::new(), |table: DataTable<User>| async move {
        let page = query_users(table.get_config()).await?;
        table.update_data_and_total_items(page.items, page.total_items);
        Ok(())
    })
    .filter("isAdult")
    .sort("createdAt");
    let table = DataTable::new(DataTableConfig::new(source).per_page(5));

    table.filter_by("isAdult", false, FilterOptions::immediate().reset_page());
    tokio::time::sleep(Duration::from_millis(100)).await;
    print_page("manual, minors", &table);
}

#[tokio::main]
async fn main() {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");

    client_demo().await;
    server_demo().await;
    manual_demo().await;

    let modals = ModalState::new(["details"]);
    modals.open_with("details", || info!("loading user details"));
    info!("modals: {:?}", modals.list());

    let signup = FormState::new(
        Schema::new()
            .field("email")
            .required("Email is required")
            .email("Invalid email format"),
        Value::Null,
    );
    signup.on_blur("email", "not-an-email");
    info!("signup email status: {:?}", signup.status("email"));
}
