use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepweave_browser::{
    BrowserEngine, BrowserEngineConfig, BrowserSession, ExtractedKind, FetchSessionFactory,
    SessionFactory, SessionManager,
};
use stepweave_core::FailureReason;
use stepweave_testing::MockOracle;
use stepweave_testing::fixtures::browser_decision;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = r#"<html><head><title>Shop</title></head>
<body><h1>Welcome</h1><p>Widget costs $5</p><a href="/about">About us</a></body></html>"#;
const ABOUT: &str = "<html><head><title>About</title></head><body>Family business</body></html>";

async fn site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOME))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABOUT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

fn factory(oracle: &MockOracle) -> FetchSessionFactory {
    FetchSessionFactory::new(Arc::new(oracle.clone()), Duration::from_secs(5))
        .unwrap()
        .with_model(Some("reader".into()))
}

#[tokio::test]
async fn navigates_and_reads_pages() {
    let server = site().await;
    let oracle = MockOracle::new().with_text("$5");
    let mut session = factory(&oracle).create().await.unwrap();

    let opened = session.goto(&format!("{}/", server.uri())).await.unwrap();
    assert_eq!(opened["status"], 200);
    assert_eq!(opened["title"], "Shop");

    let extracted = session.extract("the widget price").await.unwrap();
    assert_eq!(extracted, json!({"extraction": "$5"}));
    let call = &oracle.calls()[0];
    assert!(call.request.prompt.contains("What to extract: the widget price"));
    assert!(call.request.prompt.contains("Welcome Widget costs $5 About us"));
    assert_eq!(call.request.model.as_deref(), Some("reader"));

    // Relative links resolve against the current page.
    session.goto("/about").await.unwrap();
    assert_eq!(session.current_url(), Some(format!("{}/about", server.uri())));
    let html = session.html().await.unwrap();
    assert!(html.as_str().unwrap().contains("Family business"));

    session.nav_back().await.unwrap();
    assert_eq!(session.current_url(), Some(format!("{}/", server.uri())));
}

#[tokio::test]
async fn observe_lists_links() {
    let server = site().await;
    let oracle = MockOracle::new().with_text("A shop landing page");
    let mut session = factory(&oracle).create().await.unwrap();

    session.goto(&server.uri()).await.unwrap();
    let observed = session.observe(None).await.unwrap();
    assert_eq!(observed["observation"], "A shop landing page");
    assert_eq!(observed["links"][0]["text"], "About us");
    assert_eq!(observed["links"][0]["url"], format!("{}/about", server.uri()));
}

#[tokio::test]
async fn unsupported_and_invalid_actions_fail() {
    let server = site().await;
    let oracle = MockOracle::new();
    let mut session = factory(&oracle).create().await.unwrap();

    assert!(matches!(
        session.extract("anything").await,
        Err(FailureReason::InvalidInput { .. })
    ));
    assert!(matches!(
        session.nav_back().await,
        Err(FailureReason::InvalidInput { .. })
    ));

    let missing = session.goto(&format!("{}/missing", server.uri())).await;
    assert!(matches!(missing, Err(FailureReason::NetworkError { .. })));

    match session.act("click About").await {
        Err(FailureReason::Custom { category, .. }) => assert_eq!(category, "unsupported"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(session.screenshot().await.is_err());
}

#[tokio::test]
async fn engine_drives_fetch_session() {
    let server = site().await;
    let oracle = MockOracle::new()
        .with_structured(browser_decision("EXTRACT", Some("price")))
        .with_text("$5")
        .with_structured(browser_decision("CLOSE", None));
    let sessions = SessionManager::new(Arc::new(factory(&oracle)));
    let engine = BrowserEngine::new(Arc::new(oracle.clone()), BrowserEngineConfig::default());

    let result = engine
        .run(&sessions, "find the widget price", Some(&server.uri()))
        .await
        .unwrap();

    assert_eq!(result.total_steps, 3);
    let extract = result.results_of(ExtractedKind::Extract).next().unwrap();
    assert_eq!(extract.content, json!({"extraction": "$5"}));
    assert!(!sessions.is_open().await);
}
