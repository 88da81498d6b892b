use axum::{
    extract::{ConnectInfo, FromRequest, Multipart, Query, Request, State},
    http::{
        header::{self, HeaderMap},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Form, Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::distance::{Coordinates, DistanceUnit};
use crate::isp::IspLookup;
use crate::models::{ClientContext, Submission};
use crate::storage::RecordStore;
use crate::telemetry::TelemetryService;

pub struct AppState<S> {
    pub telemetry: TelemetryService<S>,
    /// ipinfo.io client, present when lookups are enabled
    pub isp: Option<IspLookup>,
    pub distance_unit: DistanceUnit,
    pub server_location: Option<Coordinates>,
    /// One 1 MiB block of random data, repeated by `/garbage`
    pub garbage: Bytes,
    pub garbage_chunks: usize,
}

#[derive(Deserialize)]
pub struct CardQuery {
    #[serde(default)]
    pub id: String,
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

/// Read the posted fields, either URL-encoded or `multipart/form-data`
/// (what browsers send for a `FormData` body).
async fn read_submission(request: Request) -> Result<Submission, Response> {
    if !is_multipart(request.headers()) {
        let Form(submission) = Form::<Submission>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return Ok(submission);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut submission = Submission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let value = field.text().await.map_err(IntoResponse::into_response)?;
        submission.set_field(&name, value);
    }
    Ok(submission)
}

/// Store one speed test result
pub async fn submit_telemetry<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let submission = match read_submission(request).await {
        Ok(submission) => submission,
        Err(rejection) => return rejection,
    };
    let client = ClientContext {
        ip_address: addr.ip().to_canonical().to_string(),
        user_agent: header_value(&headers, header::USER_AGENT),
        language: header_value(&headers, header::ACCEPT_LANGUAGE),
    };

    match state.telemetry.submit(submission, client).await {
        Ok(id) => (StatusCode::OK, format!("id {id}")).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response(),
    }
}

/// Render the stored result `id` as a shareable PNG card
pub async fn result_card<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CardQuery>,
) -> Response {
    match state.telemetry.render_card(&query.id).await {
        Ok(png) => (
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename={}.png", query.id),
                ),
            ],
            png,
        )
            .into_response(),
        Err(err) if err.is_not_found() => {
            (StatusCode::NOT_FOUND, "Result not found").into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
