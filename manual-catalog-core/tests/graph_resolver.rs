use manual_catalog_core::config::{GraphSource, HttpConfig};
use manual_catalog_core::contract::LinkResolver;
use manual_catalog_core::error::{CatalogError, ResolveError};
use manual_catalog_core::graph::{GraphClient, GraphResolver};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn http_config() -> HttpConfig {
    HttpConfig {
        max_retries: 2,
        retry_base_delay_ms: 1,
        ..HttpConfig::default()
    }
}

fn client(server: &MockServer) -> GraphClient {
    let config = http_config();
    GraphClient::new(config.client().unwrap(), server.uri(), TOKEN, &config)
}

fn source(server: &MockServer) -> GraphSource {
    GraphSource {
        site_hostname: "tenant.sharepoint.com".into(),
        site_path: "/sites/SupportFiles".into(),
        library: "Documents".into(),
        remote_prefix: "_Sorted_By_Manufacturer_Model".into(),
        base_url: server.uri(),
    }
}

async fn mount_site_and_drive(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/sites/tenant.sharepoint.com:/sites/SupportFiles"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "site-1" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/site-1/drives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "drive-other", "name": "Site Assets" },
                { "id": "drive-1", "name": "Documents" }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolves_existing_file_to_anonymous_link() {
    let server = MockServer::start().await;
    mount_site_and_drive(&server).await;

    Mock::given(method("GET"))
        .and(path(
            "/drives/drive-1/root:/_Sorted_By_Manufacturer_Model/Acme/X1/manual%201.pdf",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "item-42" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-1/items/item-42/createLink"))
        .and(body_json(json!({ "type": "view", "scope": "anonymous" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "link": { "webUrl": "https://tenant.sharepoint.com/:b:/s/SupportFiles/abc" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = GraphResolver::connect(client(&server), &source(&server))
        .await
        .expect("site and drive should resolve");
    let url = resolver
        .resolve("Acme/X1/manual 1.pdf")
        .await
        .expect("resolution should succeed");

    assert_eq!(
        url.as_deref(),
        Some("https://tenant.sharepoint.com/:b:/s/SupportFiles/abc")
    );
}

#[tokio::test]
async fn missing_file_yields_no_link() {
    let server = MockServer::start().await;
    mount_site_and_drive(&server).await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/root:/_Sorted_By_Manufacturer_Model/Acme/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = GraphResolver::connect(client(&server), &source(&server))
        .await
        .unwrap();
    let url = resolver.resolve("Acme/gone.pdf").await.unwrap();
    assert!(url.is_none());
}

#[tokio::test]
async fn link_creation_failure_is_a_per_file_error() {
    let server = MockServer::start().await;
    mount_site_and_drive(&server).await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/root:/_Sorted_By_Manufacturer_Model/Acme/X1/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "item-1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-1/items/item-1/createLink"))
        .respond_with(ResponseTemplate::new(403).set_body_string("sharing disabled"))
        .mount(&server)
        .await;

    let resolver = GraphResolver::connect(client(&server), &source(&server))
        .await
        .unwrap();
    match resolver.resolve("Acme/X1/a.pdf").await {
        Err(ResolveError::Status { status, body, .. }) => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "sharing disabled");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn throttled_requests_are_retried() {
    let server = MockServer::start().await;
    mount_site_and_drive(&server).await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/root:/_Sorted_By_Manufacturer_Model/Acme/X1/a.pdf"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-1/root:/_Sorted_By_Manufacturer_Model/Acme/X1/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "item-1" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-1/items/item-1/createLink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link": { "webUrl": "https://share.example.com/a" }
        })))
        .mount(&server)
        .await;

    let resolver = GraphResolver::connect(client(&server), &source(&server))
        .await
        .unwrap();
    let url = resolver.resolve("Acme/X1/a.pdf").await.unwrap();
    assert_eq!(url.as_deref(), Some("https://share.example.com/a"));
}

#[tokio::test]
async fn unknown_library_is_a_fatal_setup_error() {
    let server = MockServer::start().await;
    mount_site_and_drive(&server).await;

    let mut source = source(&server);
    source.library = "Archive".into();

    match GraphResolver::connect(client(&server), &source).await {
        Err(CatalogError::Setup(message)) => assert!(message.contains("Archive"), "{message}"),
        Err(other) => panic!("expected setup error, got {other:?}"),
        Ok(_) => panic!("expected setup error, got a resolver"),
    }
}

#[tokio::test]
async fn site_resolution_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let result = GraphResolver::connect(client(&server), &source(&server)).await;
    assert!(matches!(result, Err(CatalogError::Setup(_))));
}
