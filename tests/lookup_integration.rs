//! Integration tests for the Open Food Facts lookup client.
//!
//! The failure-path and canned-response tests run offline. The live tests
//! hit the real API and only run when OFF_LIVE_TESTS is set (in the
//! environment or .env.local).

mod http_stub;

use healthiswealth_lib::capture::ProductCode;
use healthiswealth_lib::lookup::{OpenFoodFactsClient, ProductLookup};
use healthiswealth_lib::ScannerConfig;
use std::time::Duration;

fn load_env() {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env.local");
    if env_path.exists() {
        dotenvy::from_path(&env_path).expect("Failed to load .env.local");
        eprintln!("[TEST] Loaded .env.local");
    }
}

fn live_enabled() -> bool {
    load_env();
    std::env::var("OFF_LIVE_TESTS").map(|v| !v.is_empty()).unwrap_or(false)
}

fn client_for(base_url: &str) -> OpenFoodFactsClient {
    OpenFoodFactsClient::new(&ScannerConfig {
        lookup_base_url: base_url.to_string(),
        lookup_timeout: Duration::from_secs(2),
        ..ScannerConfig::default()
    })
}

fn code(raw: &str) -> ProductCode {
    ProductCode::new(raw).unwrap()
}

#[tokio::test]
async fn unreachable_service_is_not_found() {
    // Port 9 (discard) is closed on any sane test host.
    let client = client_for("http://127.0.0.1:9");
    assert!(client.lookup(&code("5449000000996")).await.is_none());
}

#[tokio::test]
async fn malformed_base_url_is_not_found() {
    let client = client_for("not a url");
    assert!(client.lookup(&code("5449000000996")).await.is_none());
}

#[tokio::test]
async fn error_status_is_not_found() {
    let server = http_stub::serve(404, r#"{"status":0,"status_verbose":"product not found"}"#).await;
    let client = client_for(&server.base_url);

    assert!(client.lookup(&code("3017620422003")).await.is_none());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn server_error_is_not_found() {
    let server = http_stub::serve(503, "").await;
    let client = client_for(&server.base_url);
    assert!(client.lookup(&code("3017620422003")).await.is_none());
}

#[tokio::test]
async fn status_zero_payload_is_not_found() {
    let server = http_stub::serve(200, r#"{"code":"000000000000","status":0}"#).await;
    let client = client_for(&server.base_url);
    assert!(client.lookup(&code("000000000000")).await.is_none());
}

#[tokio::test]
async fn non_json_body_is_not_found() {
    let server = http_stub::serve(200, "<html>maintenance</html>").await;
    let client = client_for(&server.base_url);
    assert!(client.lookup(&code("3017620422003")).await.is_none());
}

#[tokio::test]
async fn found_product_is_requested_by_code_and_normalized() {
    let server = http_stub::serve(
        200,
        r#"{"status":1,"product":{"product_name":"X","brands":"Acme",
            "image_url":"https://images.example/x.jpg",
            "nutriments":{"sugars_100g":12.5,"energy-kcal_100g":"n/a"}}}"#,
    )
    .await;
    let client = client_for(&format!("{}/", server.base_url));

    let context = client
        .lookup(&code("3017620422003"))
        .await
        .expect("status 1 is a found product");

    assert_eq!(
        server.first_request_line(),
        "GET /api/v2/product/3017620422003.json HTTP/1.1"
    );
    assert_eq!(context.name.as_deref(), Some("X"));
    assert_eq!(context.brand.as_deref(), Some("Acme"));
    assert_eq!(context.image_url.as_deref(), Some("https://images.example/x.jpg"));
    assert_eq!(context.nutriments.get("sugars_100g"), Some(&12.5));
    assert_eq!(context.nutriments.len(), 1, "non-numeric nutriments are dropped");
}

#[tokio::test]
async fn live_known_product_has_context() {
    if !live_enabled() {
        eprintln!("SKIP: OFF_LIVE_TESTS not set");
        return;
    }

    let client = OpenFoodFactsClient::new(&ScannerConfig::default());
    let start = std::time::Instant::now();
    let context = client.lookup(&code("3017620422003")).await;
    eprintln!("[TEST] Lookup returned in {}ms", start.elapsed().as_millis());

    let context = context.expect("Nutella should be in Open Food Facts");
    eprintln!("[TEST] name: {:?}", context.name);
    eprintln!("[TEST] image: {:?}", context.image_url);
    eprintln!("[TEST] nutriments: {}", context.nutriments.len());

    assert!(context.name.is_some());
    assert!(context.image_url.is_some());
    assert!(!context.nutriments.is_empty());
}

#[tokio::test]
async fn live_unknown_product_is_not_found() {
    if !live_enabled() {
        eprintln!("SKIP: OFF_LIVE_TESTS not set");
        return;
    }

    let client = OpenFoodFactsClient::new(&ScannerConfig::default());
    assert!(client.lookup(&code("000000000000")).await.is_none());
}
