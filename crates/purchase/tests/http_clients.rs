//! Wire contract of the HTTP payment and carrier clients, checked against
//! local stub servers.

use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use domain::{Price, ShippingStatus};
use purchase::{
    Carrier, ErrorKind, HttpCarrier, HttpPaymentGateway, PaymentGateway, PaymentStatus,
    ShipmentAddresses,
};
use serde_json::{Value, json};

const TIMEOUT: Duration = Duration::from_secs(5);
const CARRIER_TOKEN: &str = "carrier-secret";

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn token(Json(body): Json<Value>) -> Json<Value> {
    let authorized = body["shop_id"] == "11" && body["api_key"] == "pay-key";
    let status = match body["token"].as_str() {
        _ if !authorized => "invalid",
        Some("declined") => "fail",
        Some(_) if body["price"] == 500 => "ok",
        _ => "invalid",
    };
    Json(json!({ "status": status }))
}

fn payment_stub() -> Router {
    Router::new().route("/token", post(token))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .is_some_and(|value| value == CARRIER_TOKEN)
}

async fn create(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body["to_name"], "buyer");
    assert_eq!(body["from_address"], "1 Elm St");
    Json(json!({ "reserve_id": "R42", "reserve_time": 1_700_000_000 })).into_response()
}

async fn request(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match body["reserve_id"].as_str() {
        Some("R42") => Bytes::from_static(b"\x89PNG label").into_response(),
        _ => Bytes::new().into_response(),
    }
}

async fn status(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match body["reserve_id"].as_str() {
        Some("R42") => Json(json!({ "status": "shipping", "reserve_time": 1_700_000_000 }))
            .into_response(),
        Some("lost") => Json(json!({ "status": "misplaced" })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn carrier_stub() -> Router {
    Router::new()
        .route("/create", post(create))
        .route("/request", post(request))
        .route("/status", post(status))
}

fn addresses() -> ShipmentAddresses {
    ShipmentAddresses {
        to_address: "2 Oak Ave".to_string(),
        to_name: "buyer".to_string(),
        from_address: "1 Elm St".to_string(),
        from_name: "seller".to_string(),
    }
}

fn price(value: i64) -> Price {
    Price::new(value).unwrap()
}

#[tokio::test]
async fn test_payment_capture_ok() {
    let base = spawn(payment_stub()).await;
    let gateway = HttpPaymentGateway::new(base, "11", "pay-key", TIMEOUT).unwrap();

    let status = gateway.capture("tok", price(500)).await.unwrap();
    assert_eq!(status, PaymentStatus::Ok);
}

#[tokio::test]
async fn test_payment_verdicts_are_not_errors() {
    let base = spawn(payment_stub()).await;
    let gateway = HttpPaymentGateway::new(base.clone(), "11", "pay-key", TIMEOUT).unwrap();

    let status = gateway.capture("declined", price(500)).await.unwrap();
    assert_eq!(status, PaymentStatus::Fail);

    let status = gateway.capture("tok", price(900)).await.unwrap();
    assert_eq!(status, PaymentStatus::Invalid);

    let wrong_key = HttpPaymentGateway::new(base, "11", "other", TIMEOUT).unwrap();
    let status = wrong_key.capture("tok", price(500)).await.unwrap();
    assert_eq!(status, PaymentStatus::Invalid);
}

#[tokio::test]
async fn test_payment_unreachable_is_external_failure() {
    let base = spawn(Router::new()).await;
    let gateway = HttpPaymentGateway::new(base, "11", "pay-key", TIMEOUT).unwrap();

    let err = gateway.capture("tok", price(500)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
}

#[tokio::test]
async fn test_carrier_round_trip() {
    let base = spawn(carrier_stub()).await;
    let carrier = HttpCarrier::new(format!("{base}/"), CARRIER_TOKEN, TIMEOUT).unwrap();

    let reservation = carrier.reserve(&addresses()).await.unwrap();
    assert_eq!(reservation.reserve_id, "R42");
    assert_eq!(reservation.reserve_time, 1_700_000_000);

    let label = carrier.fetch_label("R42").await.unwrap();
    assert!(label.starts_with(b"\x89PNG"));

    let status = carrier.poll_status("R42").await.unwrap();
    assert_eq!(status, ShippingStatus::Shipping);
}

#[tokio::test]
async fn test_carrier_requires_token() {
    let base = spawn(carrier_stub()).await;
    let carrier = HttpCarrier::new(base, "wrong", TIMEOUT).unwrap();

    let err = carrier.reserve(&addresses()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
}

#[tokio::test]
async fn test_carrier_empty_label_is_failure() {
    let base = spawn(carrier_stub()).await;
    let carrier = HttpCarrier::new(base, CARRIER_TOKEN, TIMEOUT).unwrap();

    let err = carrier.fetch_label("R7").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
}

#[tokio::test]
async fn test_carrier_unknown_status_is_failure() {
    let base = spawn(carrier_stub()).await;
    let carrier = HttpCarrier::new(base, CARRIER_TOKEN, TIMEOUT).unwrap();

    let err = carrier.poll_status("lost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);

    let err = carrier.poll_status("R9").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
}
