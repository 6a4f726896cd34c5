//! WebDriver backend against a mocked driver server
//!
//! wiremock stands in for geckodriver: every wire command the session
//! issues is matched by method, path and, where it matters, JSON body.

use branchmap::config::{BackendConfig, BackendKind, ExtractionConfig, SessionConfig, TargetConfig};
use branchmap::crawler::{CrawlSettings, RetryPolicy};
use branchmap::page::{BackendError, BrowserSession, Credentials, WebDriverSession};
use branchmap::storage::{GraphStore, SqliteStorage};
use branchmap::{crawl_with_session, BranchmapError, ItemDescriptor};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const SESSION: &str = "f00d";

fn ok(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": value }))
}

fn elements(ids: &[&str]) -> ResponseTemplate {
    ok(Value::Array(
        ids.iter().map(|id| json!({ ELEMENT_KEY: id })).collect(),
    ))
}

fn session_path(suffix: &str) -> String {
    format!("/session/{}/{}", SESSION, suffix)
}

fn create_session(server: &MockServer) -> WebDriverSession {
    let backend = BackendConfig {
        kind: BackendKind::Webdriver,
        webdriver_url: server.uri(),
        browser: "firefox".to_string(),
        headless: true,
    };
    let target = TargetConfig {
        base_url: "https://aris.example.com".to_string(),
        scope_name: "Enterprise".to_string(),
        item_path: "#insights/item".to_string(),
        item_suffix: String::new(),
    };
    let extraction = ExtractionConfig {
        timeout_secs: 0,
        location_attribute: "data-id".to_string(),
        landmark: "//h1[contains(text(), {title})]".to_string(),
        containers: "//div[@id='groups']//a".to_string(),
        leaves: "//div[@id='models']//a".to_string(),
    };
    WebDriverSession::new(backend, target, extraction).expect("Failed to build session")
}

async fn mount_new_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_partial_json(json!({
            "capabilities": { "alwaysMatch": { "browserName": "firefox" } }
        })))
        .respond_with(ok(json!({ "sessionId": SESSION, "capabilities": {} })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_find(server: &MockServer, xpath: &str, ids: &[&str]) {
    Mock::given(method("POST"))
        .and(path(session_path("elements")))
        .and(body_partial_json(json!({ "using": "xpath", "value": xpath })))
        .respond_with(elements(ids))
        .mount(server)
        .await;
}

/// Catch-all driver commands; mount after any more specific mock
async fn mount_common(server: &MockServer) {
    mount_new_session(server).await;

    Mock::given(method("POST"))
        .and(path(session_path("url")))
        .respond_with(ok(Value::Null))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(session_path("url")))
        .respond_with(ok(json!("about:blank")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/session/f00d/element/[^/]+/displayed$"))
        .respond_with(ok(json!(true)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/session/f00d/element/[^/]+/(click|value)$"))
        .respond_with(ok(Value::Null))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/session/{}", SESSION)))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_model(server: &MockServer, element: &str, location: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(session_path(&format!("element/{}/attribute/data-id", element))))
        .respond_with(ok(json!(location)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(session_path(&format!("element/{}/text", element))))
        .respond_with(ok(json!(title)))
        .mount(server)
        .await;
}

fn test_settings() -> CrawlSettings {
    CrawlSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
            landmark_timeout: Duration::ZERO,
        },
        extraction_timeout: Duration::ZERO,
        ..CrawlSettings::new("Enterprise")
    }
}

#[tokio::test]
async fn test_crawl_single_page_through_driver() {
    let server = MockServer::start().await;

    mount_find(&server, "//h1[contains(text(), 'Root Group')]", &["h1"]).await;
    mount_find(&server, "//div[@id='groups']//a", &[]).await;
    mount_find(&server, "//div[@id='models']//a", &["m1", "m2", "m3"]).await;
    mount_model(&server, "m1", "mdl-one", " Model One ").await;
    mount_model(&server, "m2", "mdl-two", "Model Two").await;
    // Rendered without a location: ignored
    Mock::given(method("GET"))
        .and(path(session_path("element/m3/attribute/data-id")))
        .respond_with(ok(Value::Null))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(session_path("url")))
        .and(body_partial_json(json!({
            "url": "https://aris.example.com/#insights/item/grp-root/"
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    mount_common(&server).await;

    let mut session = create_session(&server);
    let mut store = SqliteStorage::new_in_memory().unwrap();

    let report = crawl_with_session(
        &mut session,
        &mut store,
        test_settings(),
        ItemDescriptor::new("grp-root", "Root Group"),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.nodes_created, 3);
    assert_eq!(report.edges_created, 2);

    let one = store.find_node_by_location("mdl-one").unwrap().unwrap();
    assert_eq!(one.title, "Model One");
    assert!(one.is_leaf);
    assert!(session.session_id().is_none());
}

#[tokio::test]
async fn test_missing_landmark_is_retried_then_fatal() {
    let server = MockServer::start().await;

    mount_find(&server, "//h1[contains(text(), 'Root Group')]", &[]).await;
    Mock::given(method("POST"))
        .and(path(session_path("url")))
        .and(body_partial_json(json!({
            "url": "https://aris.example.com/#insights/item/grp-root/"
        })))
        .respond_with(ok(Value::Null))
        .expect(3)
        .mount(&server)
        .await;
    mount_common(&server).await;

    let mut session = create_session(&server);
    let mut store = SqliteStorage::new_in_memory().unwrap();

    let result = crawl_with_session(
        &mut session,
        &mut store,
        test_settings(),
        ItemDescriptor::new("grp-root", "Root Group"),
    )
    .await;

    assert!(matches!(result, Err(BranchmapError::Navigation(_))));
    assert_eq!(store.count_nodes(None).unwrap(), 0);
    // The session was still released
    assert!(session.session_id().is_none());
}

#[tokio::test]
async fn test_sign_in_and_sign_out_flow() {
    let server = MockServer::start().await;

    mount_find(&server, "//input[@id='username']", &["user"]).await;
    mount_find(&server, "//input[@id='password']", &["pass"]).await;
    mount_find(&server, "//button[@id='login']", &["submit"]).await;
    mount_find(&server, "//div[@id='home']", &["home"]).await;
    mount_find(&server, "//button[@id='user-menu']", &["menu"]).await;
    mount_find(&server, "//a[@id='sign-out']", &["logout"]).await;

    Mock::given(method("POST"))
        .and(path(session_path("url")))
        .and(body_partial_json(json!({
            "url": "https://aris.example.com/#default/home"
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(session_path("element/user/value")))
        .and(body_partial_json(json!({ "text": "alice" })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(session_path("element/pass/value")))
        .and(body_partial_json(json!({ "text": "s3cret" })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(session_path("element/logout/click")))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    mount_common(&server).await;

    let flow = SessionConfig {
        home_path: "#default/home".to_string(),
        username_field: "//input[@id='username']".to_string(),
        password_field: "//input[@id='password']".to_string(),
        submit_button: "//button[@id='login']".to_string(),
        ready_landmark: "//div[@id='home']".to_string(),
        user_menu: Some("//button[@id='user-menu']".to_string()),
        sign_out: Some("//a[@id='sign-out']".to_string()),
    };
    let mut session = create_session(&server).with_sign_in(
        flow,
        Credentials {
            username: "alice".to_string(),
            password: "s3cret".to_string(),
        },
    );

    session.open().await.expect("Open failed");
    assert_eq!(session.session_id(), Some(SESSION));

    session.close().await.expect("Close failed");
    assert!(session.session_id().is_none());
}

#[tokio::test]
async fn test_driver_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": {
                "error": "session not created",
                "message": "Unable to find a matching set of capabilities",
                "stacktrace": ""
            }
        })))
        .mount(&server)
        .await;

    let mut session = create_session(&server);
    let mut store = SqliteStorage::new_in_memory().unwrap();

    let result = crawl_with_session(
        &mut session,
        &mut store,
        test_settings(),
        ItemDescriptor::new("grp-root", "Root Group"),
    )
    .await;

    match result {
        Err(BranchmapError::Backend(BackendError::WebDriver { error, message })) => {
            assert_eq!(error, "session not created");
            assert!(message.contains("capabilities"));
        }
        other => panic!("Expected a driver error, got {:?}", other),
    }
    assert_eq!(store.count_runs().unwrap(), 0);
}
