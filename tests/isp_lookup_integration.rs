//! ISP lookup tests against a local stand-in for the ipinfo.io API

use axum::{
    body::{to_bytes, Body},
    extract::{connect_info::MockConnectInfo, Path, Query},
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use speedtest::api::{create_router, AppState};
use speedtest::distance::{Coordinates, DistanceUnit};
use speedtest::ids::IdGenerator;
use speedtest::isp::IspLookup;
use speedtest::redaction::Redactor;
use speedtest::render::{FontSet, ResultRenderer, Typeface};
use speedtest::storage::{RecordStore, SqliteStorage};
use speedtest::telemetry::TelemetryService;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

async fn client_info(
    Path(ip): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(json!({
        "ip": ip,
        "hostname": "cust5.example.net",
        "city": "Null Island",
        "country": "US",
        "loc": "0.0000,1.0000",
        "org": "AS64500 Example ISP",
    })))
}

async fn own_info() -> Json<Value> {
    Json(json!({ "ip": "192.0.2.10", "loc": "0.0000,0.0000", "org": "AS64501 Hosting" }))
}

/// Start the stand-in API and return its base URL
async fn spawn_ipinfo() -> String {
    let app = Router::new()
        .route("/json", get(own_info))
        .route("/{ip}/json", get(client_info));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_lookup_client() {
    let base = spawn_ipinfo().await;
    let lookup = IspLookup::new(base, Some(TOKEN.to_string())).unwrap();

    let (raw, info) = lookup
        .lookup(Some("203.0.113.5".parse().unwrap()))
        .await
        .unwrap();
    assert!(raw.contains("cust5.example.net"));
    assert_eq!(info.organization, "AS64500 Example ISP");
    assert_eq!(info.country, "US");
    assert_eq!(info.location, "0.0000,1.0000");
}

#[tokio::test]
async fn test_lookup_rejected_token_is_error() {
    let base = spawn_ipinfo().await;
    let lookup = IspLookup::new(base, Some("wrong".to_string())).unwrap();
    assert!(lookup.lookup(Some("203.0.113.5".parse().unwrap())).await.is_err());
}

#[tokio::test]
async fn test_server_location() {
    let base = spawn_ipinfo().await;
    let lookup = IspLookup::new(base, None).unwrap();
    assert_eq!(lookup.server_location().await, Some(Coordinates::ORIGIN));

    let unreachable = IspLookup::new("http://127.0.0.1:1", None).unwrap();
    assert_eq!(unreachable.server_location().await, None);
}

async fn get_ip(router: Router, uri: &str) -> Value {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// getIP never draws anything
struct NullFace;

impl Typeface for NullFace {
    fn measure(&self, _text: &str, _size: f32) -> i32 {
        0
    }

    fn draw(&self, _: &mut RgbaImage, _: i32, _: i32, _: &str, _: f32, _: Rgba<u8>) {}
}

async fn router_with_lookup(base: String, client: SocketAddr) -> Router {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();

    let fonts = FontSet::new(Arc::new(NullFace), Arc::new(NullFace));
    let telemetry = TelemetryService::new(
        Arc::new(storage),
        Arc::new(IdGenerator::new()),
        Redactor::new(false),
        Arc::new(ResultRenderer::new(fonts, "LibreSpeed")),
    );

    let state = AppState {
        telemetry,
        isp: Some(IspLookup::new(base, Some(TOKEN.to_string())).unwrap()),
        distance_unit: DistanceUnit::Kilometers,
        server_location: Some(Coordinates::ORIGIN),
        garbage: Bytes::new(),
        garbage_chunks: 0,
    };

    create_router(state, None, false).layer(MockConnectInfo(client))
}

#[tokio::test]
async fn test_get_ip_with_lookup() {
    let base = spawn_ipinfo().await;
    let router = router_with_lookup(base, SocketAddr::from(([203, 0, 113, 5], 50000))).await;

    let json = get_ip(router.clone(), "/getIP").await;
    assert_eq!(
        json["processedString"],
        "203.0.113.5 - Example ISP, US, (111.19 km)"
    );
    assert_eq!(json["rawIspInfo"]["hostname"], "cust5.example.net");

    let miles = get_ip(router, "/getIP?distance=mi").await;
    assert_eq!(
        miles["processedString"],
        "203.0.113.5 - Example ISP, US, (69.09 mi)"
    );
}

#[tokio::test]
async fn test_get_ip_private_address_skips_lookup() {
    // Nothing listens here; a lookup attempt would fail
    let router = router_with_lookup(
        "http://127.0.0.1:1".to_string(),
        SocketAddr::from(([10, 0, 0, 8], 50000)),
    )
    .await;

    let json = get_ip(router, "/getIP").await;
    assert_eq!(json["processedString"], "10.0.0.8 - private IPv4 access");
}

#[tokio::test]
async fn test_get_ip_lookup_failure_falls_back_to_address() {
    let router = router_with_lookup(
        "http://127.0.0.1:1".to_string(),
        SocketAddr::from(([198, 51, 100, 20], 50000)),
    )
    .await;

    let json = get_ip(router, "/getIP").await;
    assert_eq!(json["processedString"], "198.51.100.20");
    assert_eq!(json["rawIspInfo"], "");
}
