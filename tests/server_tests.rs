mod common;

use common::*;
use quote_ledger::aggregator::PriceAggregator;
use quote_ledger::errors::QuoteError;
use quote_ledger::ledger::SheetsLedger;
use quote_ledger::server::routes;
use quote_ledger::service::PriceService;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use test_log::test;
use warp::http::StatusCode;

fn service(primary: Behaviour, secondary: Behaviour, sheets: FakeSheets) -> Arc<PriceService> {
    let caller = FakeCaller::new([("primary", primary), ("secondary", secondary)]);
    let aggregator = PriceAggregator::new(
        Arc::new(caller),
        vec![router("primary"), router("secondary")],
        Duration::from_millis(200),
    );
    Arc::new(PriceService::new(
        aggregator,
        Arc::new(SheetsLedger::new(sheets)),
        target(&["primary", "secondary"]),
    ))
}

fn healthy(sheets: FakeSheets) -> Arc<PriceService> {
    service(
        Behaviour::quote(amount(305, 0)),
        Behaviour::quote(amount(303, 5)),
        sheets,
    )
}

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[test(tokio::test)]
async fn test_get_prices() {
    let sheets = FakeSheets::default();
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/prices?tokenIn={WBNB}&tokenOut={BUSD}"))
        .reply(&routes(healthy(sheets.clone())))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(&response);
    assert_eq!(body["tokenIn"], json!(WBNB));
    assert_eq!(body["tokenOut"], json!(BUSD));
    assert_eq!(body["primary"], json!(305.0));
    assert_eq!(body["secondary"], json!(303.5));
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(sheets.rows().len(), 1);
}

#[test(tokio::test)]
async fn test_post_prices() {
    let sheets = FakeSheets::default();
    let response = warp::test::request()
        .method("POST")
        .path("/prices")
        .json(&json!({ "tokenIn": WBNB, "tokenOut": BUSD }))
        .reply(&routes(healthy(sheets.clone())))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["primary"], json!(305.0));
    assert_eq!(sheets.rows().len(), 1);
}

#[test(tokio::test)]
async fn test_validation_error_is_bad_request() {
    let sheets = FakeSheets::default();
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/prices?tokenOut={BUSD}"))
        .reply(&routes(healthy(sheets.clone())))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body(&response);
    assert_eq!(body["error"], json!("validation_error"));
    assert_eq!(body["detail"], json!("Missing required field: tokenIn"));
    assert!(sheets.rows().is_empty());
}

#[test(tokio::test)]
async fn test_all_sources_failed_is_bad_gateway() {
    let sheets = FakeSheets::default();
    let service = service(
        Behaviour::Fail(QuoteError::Chain {
            reason: "execution reverted".into(),
        }),
        Behaviour::Hang,
        sheets.clone(),
    );

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/prices?tokenIn={WBNB}&tokenOut={BUSD}"))
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body(&response);
    assert_eq!(body["error"], json!("all_sources_failed"));
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("primary: chain call failed: execution reverted"), "{detail}");
    assert!(detail.contains("secondary: timed out after 200ms"), "{detail}");
    assert!(sheets.rows().is_empty());
}

#[test(tokio::test)]
async fn test_ledger_failure_is_bad_gateway() {
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/prices?tokenIn={WBNB}&tokenOut={BUSD}"))
        .reply(&routes(healthy(FakeSheets::failing(500))))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body(&response)["error"], json!("ledger_error"));
}

#[test(tokio::test)]
async fn test_malformed_json_body() {
    let response = warp::test::request()
        .method("POST")
        .path("/prices")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&routes(healthy(FakeSheets::default())))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&response)["error"], json!("request_error"));
}

#[test(tokio::test)]
async fn test_health_and_unknown_paths() {
    let filter = routes(healthy(FakeSheets::default()));

    let response = warp::test::request().path("/health").reply(&filter).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body(&response),
        json!({
            "status": "ok",
            "routers": ["primary", "secondary"],
            "ledgerRange": "ArbitrageBotSheet!A2:E",
        })
    );

    let response = warp::test::request().path("/nope").reply(&filter).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test(tokio::test)]
async fn test_cors_preflight() {
    let response = warp::test::request()
        .method("OPTIONS")
        .path("/prices")
        .header("origin", "https://dashboard.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .reply(&routes(healthy(FakeSheets::default())))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
