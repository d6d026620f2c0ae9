use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use carbon_api::{build_app, ApiConfig};
use carbon_estimator::GeminiConfig;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

const GENERATE_PATH: &str = "/v1beta/models/gemini-pro:generateContent";

fn fallback_app() -> Router {
    build_app(&ApiConfig::default()).expect("app should build")
}

async fn post_recalculate(app: Router, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/recalculate")
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn milk_request() -> Value {
    json!({
        "pincode": "560016",
        "items": [
            { "name": "Milk", "sourcePincode": "560001", "estimatedCarbon": 1.2 }
        ]
    })
}

#[tokio::test]
async fn health_reports_capabilities() {
    let response = fallback_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["capabilities"]["estimator_key_present"], false);
    assert_eq!(parsed["capabilities"]["gazetteer_entries"], 7);
}

#[tokio::test]
async fn milk_scenario_uses_fallback_formula() {
    let (status, body) =
        post_recalculate(fallback_app(), Body::from(milk_request().to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["userPincode"], "560016");
    assert_eq!(body["gemini_key_present"], false);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    let milk = &results[0];
    assert_eq!(milk["name"], "Milk");
    assert_eq!(milk["distance_km"].as_f64(), Some(8.75));
    let footprint = milk["carbon_footprint"].as_f64().unwrap();
    assert!((footprint - 2.075).abs() < 1e-9, "got {footprint}");
    assert_eq!(milk["sourcePincode"], "560001");
    assert_eq!(milk["userPincode"], "560016");
    assert_eq!(milk["original"]["estimatedCarbon"], 1.2);
}

#[tokio::test]
async fn results_follow_input_order_and_unknown_codes_have_no_distance() {
    let request = json!({
        "pincode": "560016",
        "items": [
            { "name": "Rice", "sourcePincode": "110001" },
            { "name": "Mystery", "sourcePincode": "000000", "estimatedCarbon": 2.0 },
            { "name": "Atta", "sellerPincode": "400001" },
            { "name": "Loose" }
        ]
    });
    let (status, body) = post_recalculate(fallback_app(), Body::from(request.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    let names = results
        .iter()
        .map(|result| result["name"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Rice", "Mystery", "Atta", "Loose"]);

    assert!(results[0]["distance_km"].as_f64().unwrap() > 1000.0);
    assert!(results[1]["distance_km"].is_null());
    assert_eq!(results[1]["carbon_footprint"].as_f64(), Some(2.0));
    assert_eq!(results[2]["sourcePincode"], "400001");
    assert!(results[2]["distance_km"].as_f64().is_some());
    assert!(results[3]["distance_km"].is_null());
    assert!(results[3]["sourcePincode"].is_null());
    assert_eq!(results[3]["carbon_footprint"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn original_echoes_each_item_as_sent() {
    let paneer = json!({
        "name": "Paneer",
        "sourcePincode": 560001,
        "estimatedCarbon": "2.5",
        "price": { "amount": 90 },
        "platform": "zepto"
    });
    let salt = json!({ "name": "Salt", "estimatedCarbon": "lots", "quantity": null });
    let request = json!({ "pincode": "560016", "items": [paneer.clone(), salt.clone()] });

    let (status, body) = post_recalculate(fallback_app(), Body::from(request.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["original"], paneer);
    assert_eq!(results[0]["sourcePincode"], "560001");
    assert_eq!(results[0]["distance_km"].as_f64(), Some(8.75));
    let footprint = results[0]["carbon_footprint"].as_f64().unwrap();
    assert!((footprint - 3.375).abs() < 1e-9, "got {footprint}");

    assert_eq!(results[1]["original"], salt);
    assert_eq!(results[1]["carbon_footprint"].as_f64(), Some(1.0));
}

#[tokio::test]
async fn unknown_user_pincode_blanks_every_distance() {
    let request = json!({
        "pincode": "999999",
        "items": [{ "name": "Milk", "sourcePincode": "560001", "estimatedCarbon": 1.2 }]
    });
    let (_, body) = post_recalculate(fallback_app(), Body::from(request.to_string())).await;

    assert!(body["results"][0]["distance_km"].is_null());
    assert_eq!(body["results"][0]["carbon_footprint"].as_f64(), Some(1.2));
}

#[tokio::test]
async fn malformed_bodies_degrade_to_empty_results() {
    for raw in ["", "not json", "[1,2,3]", r#"{"pincode": "560016", "items": "milk"}"#] {
        let (status, body) = post_recalculate(fallback_app(), Body::from(raw)).await;
        assert_eq!(status, StatusCode::OK, "body {raw:?}");
        assert_eq!(body["success"], true);
        assert_eq!(body["results"].as_array().map(Vec::len), Some(0));
    }
}

#[tokio::test]
async fn empty_basket_is_a_successful_response() {
    let request = json!({ "pincode": " 560016 ", "items": [] });
    let (status, body) = post_recalculate(fallback_app(), Body::from(request.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userPincode"], "560016");
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn remote_estimate_is_used_when_available() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .query_param("key", "test-key")
                .body_contains("\"contents\"")
                .body_contains("Distance Traveled: 8.75 km");
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "parts": [ { "text": "Total: 3.4 kg CO2\nFinal Answer: 3.4" } ] } }
                ]
            }));
        })
        .await;

    let config = ApiConfig {
        gemini: Some(GeminiConfig::new("test-key").with_endpoint(server.url(GENERATE_PATH))),
        ..ApiConfig::default()
    };
    let app = build_app(&config).unwrap();
    let (status, body) = post_recalculate(app, Body::from(milk_request().to_string())).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gemini_key_present"], true);
    assert_eq!(body["results"][0]["carbon_footprint"].as_f64(), Some(3.4));
}

#[tokio::test]
async fn remote_server_error_falls_back_without_failing_the_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(500).body("upstream exploded");
        })
        .await;

    let config = ApiConfig {
        gemini: Some(GeminiConfig::new("test-key").with_endpoint(server.url(GENERATE_PATH))),
        ..ApiConfig::default()
    };
    let (status, body) =
        post_recalculate(build_app(&config).unwrap(), Body::from(milk_request().to_string()))
            .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gemini_key_present"], true);
    let footprint = body["results"][0]["carbon_footprint"].as_f64().unwrap();
    assert!((footprint - 2.075).abs() < 1e-9, "got {footprint}");
}

#[tokio::test]
async fn remote_timeout_falls_back() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({
                    "candidates": [ { "content": { "parts": [ { "text": "99" } ] } } ]
                }));
        })
        .await;

    let config = ApiConfig {
        gemini: Some(
            GeminiConfig::new("test-key")
                .with_endpoint(server.url(GENERATE_PATH))
                .with_timeout(Duration::from_secs(1)),
        ),
        ..ApiConfig::default()
    };
    let (status, body) =
        post_recalculate(build_app(&config).unwrap(), Body::from(milk_request().to_string()))
            .await;

    assert_eq!(status, StatusCode::OK);
    let footprint = body["results"][0]["carbon_footprint"].as_f64().unwrap();
    assert!((footprint - 2.075).abs() < 1e-9, "got {footprint}");
}
