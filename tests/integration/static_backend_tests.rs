//! End-to-end crawls over the static HTML backend
//!
//! A wiremock server plays the application, serving one page per item.

use branchmap::config::parse_config;
use branchmap::page::StaticHtmlSession;
use branchmap::storage::{GraphStore, RunStatus, SqliteStorage};
use branchmap::{crawl_with_session, BranchmapError, CrawlSettings, ItemDescriptor, NavigationError};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_toml(base_url: &str, db_path: &Path) -> String {
    format!(
        r#"
[target]
base-url = "{}"
scope-name = "Enterprise"
item-path = "items"

[backend]
kind = "static"

[retry]
max-attempts = 3
delay-ms = 0
landmark-timeout-secs = 1

[extraction]
location-attribute = "data-id"
landmark = "h1"
containers = "ul.groups a"
leaves = "ul.models a"

[output]
database-path = "{}"
"#,
        base_url,
        db_path.display()
    )
}

fn item_page(title: &str, groups: &[(&str, &str)], models: &[(&str, &str)]) -> String {
    let links = |items: &[(&str, &str)]| {
        items
            .iter()
            .map(|(id, name)| format!(r#"<li><a data-id="{}">{}</a></li>"#, id, name))
            .collect::<String>()
    };
    format!(
        r#"<html><body>
        <h1>{}</h1>
        <ul class="groups">{}</ul>
        <ul class="models">{}</ul>
        </body></html>"#,
        title,
        links(groups),
        links(models)
    )
}

async fn mount_page(server: &MockServer, location: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/items/{}/", location)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_over_static_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("snapshot.db");
    let config = parse_config(&config_toml(&server.uri(), &db_path)).expect("Invalid config");

    mount_page(
        &server,
        "grp-root",
        item_page(
            "Enterprise Architecture",
            &[("grp-sales", "Sales"), ("grp-ops", "Operations")],
            &[("mdl-map", "Value Map")],
        ),
    )
    .await;
    mount_page(
        &server,
        "grp-sales",
        item_page("Sales", &[], &[("mdl-order", "Order to Cash"), ("mdl-map", "Value Map")]),
    )
    .await;
    mount_page(&server, "grp-ops", item_page("Operations", &[], &[])).await;

    let mut session = StaticHtmlSession::new(config.target.clone(), config.extraction.clone())
        .expect("Failed to build session");
    let mut store = SqliteStorage::new(&db_path).expect("Failed to open database");
    let settings = CrawlSettings::from_config(&config, "test-hash");

    let report = crawl_with_session(
        &mut session,
        &mut store,
        settings,
        ItemDescriptor::new("grp-root", "Enterprise Architecture"),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.nodes_created, 5);
    // root->sales, root->ops, root->map, sales->order, sales->map
    assert_eq!(report.edges_created, 5);

    assert_eq!(store.count_nodes(Some(false)).unwrap(), 3);
    assert_eq!(store.count_nodes(Some(true)).unwrap(), 2);

    let sales = store.find_node_by_location("grp-sales").unwrap().unwrap();
    assert_eq!(sales.title, "Sales");
    assert_eq!(sales.scope_name, "Enterprise");
    assert!(sales.expanded);

    let map = store.find_node_by_location("mdl-map").unwrap().unwrap();
    assert!(map.is_leaf);
    assert_eq!(store.get_incoming_edges(map.id).unwrap().len(), 2);

    let run = store.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.root_location, "grp-root");
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("snapshot.db");
    let config = parse_config(&config_toml(&server.uri(), &db_path)).expect("Invalid config");

    mount_page(
        &server,
        "grp-root",
        item_page("Root", &[("grp-broken", "Broken")], &[]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/items/grp-broken/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut session =
        StaticHtmlSession::new(config.target.clone(), config.extraction.clone()).unwrap();
    let mut store = SqliteStorage::new(&db_path).unwrap();

    let result = crawl_with_session(
        &mut session,
        &mut store,
        CrawlSettings::from_config(&config, ""),
        ItemDescriptor::new("grp-root", "Root"),
    )
    .await;

    match result {
        Err(BranchmapError::Navigation(NavigationError::Fatal { location, attempts, .. })) => {
            assert_eq!(location, "grp-broken");
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected a fatal navigation error, got {:?}", other),
    }

    let broken = store.find_node_by_location("grp-broken").unwrap().unwrap();
    assert!(!broken.expanded);
    assert!(store.get_outgoing_edges(broken.id).unwrap().is_empty());
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_wrong_page_title_is_not_accepted() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("snapshot.db");
    let config = parse_config(&config_toml(&server.uri(), &db_path)).expect("Invalid config");

    // The server answers, but with a page for some other item
    mount_page(&server, "grp-root", item_page("Something Else", &[], &[])).await;

    let mut session =
        StaticHtmlSession::new(config.target.clone(), config.extraction.clone()).unwrap();
    let mut store = SqliteStorage::new(&db_path).unwrap();

    let result = crawl_with_session(
        &mut session,
        &mut store,
        CrawlSettings::from_config(&config, ""),
        ItemDescriptor::new("grp-root", "Root"),
    )
    .await;

    assert!(matches!(
        result,
        Err(BranchmapError::Navigation(NavigationError::Fatal { .. }))
    ));
    assert_eq!(store.count_nodes(None).unwrap(), 0);
}

#[tokio::test]
async fn test_snapshot_survives_reopening_the_database() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("snapshot.db");
    let config = parse_config(&config_toml(&server.uri(), &db_path)).expect("Invalid config");

    mount_page(
        &server,
        "grp-root",
        item_page("Root", &[], &[("mdl-one", "Model One")]),
    )
    .await;

    {
        let mut session =
            StaticHtmlSession::new(config.target.clone(), config.extraction.clone()).unwrap();
        let mut store = SqliteStorage::new(&db_path).unwrap();
        crawl_with_session(
            &mut session,
            &mut store,
            CrawlSettings::from_config(&config, ""),
            ItemDescriptor::new("grp-root", "Root"),
        )
        .await
        .expect("Crawl failed");
    }

    let store = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(store.count_nodes(None).unwrap(), 2);
    assert_eq!(store.count_edges().unwrap(), 1);
    assert_eq!(store.count_runs().unwrap(), 1);
}
