//! Measurement endpoints used by the browser client while a test runs.

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use super::handlers::AppState;
use crate::config::MAX_GARBAGE_CHUNKS;
use crate::distance::DistanceUnit;
use crate::isp::{classify, describe, IpDescription};
use crate::storage::RecordStore;

pub const GARBAGE_CHUNK_SIZE: usize = 1024 * 1024;

/// Fill one garbage chunk with random bytes.
pub fn garbage_chunk() -> Bytes {
    let mut data = Vec::with_capacity(GARBAGE_CHUNK_SIZE);
    while data.len() < GARBAGE_CHUNK_SIZE {
        data.extend_from_slice(&rand::random::<u64>().to_le_bytes());
    }
    Bytes::from(data)
}

#[derive(Deserialize)]
pub struct GarbageQuery {
    #[serde(rename = "ckSize")]
    pub chunk_count: Option<String>,
}

#[derive(Deserialize)]
pub struct IpQuery {
    pub distance: Option<String>,
}

/// Number of chunks requested, bounded by `MAX_GARBAGE_CHUNKS`.
pub fn chunk_count(requested: Option<&str>, default: usize) -> usize {
    requested
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
        .min(MAX_GARBAGE_CHUNKS)
}

/// Upload target: read and discard the body.
pub async fn empty(body: Body) -> StatusCode {
    let mut data = body.into_data_stream();
    while let Some(chunk) = data.next().await {
        if chunk.is_err() {
            // Client aborted the upload mid-stream
            break;
        }
    }
    StatusCode::OK
}

/// Download source: stream the shared random chunk `ckSize` times.
pub async fn garbage<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<GarbageQuery>,
) -> Response {
    let chunks = chunk_count(query.chunk_count.as_deref(), state.garbage_chunks);
    let body = stream::iter(std::iter::repeat_n(state.garbage.clone(), chunks))
        .map(Ok::<_, Infallible>);

    (
        [
            (HeaderName::from_static("content-description"), "File Transfer"),
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_DISPOSITION, "attachment; filename=random.dat"),
            (
                HeaderName::from_static("content-transfer-encoding"),
                "binary",
            ),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Describe the client's address and provider.
pub async fn get_ip<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<IpQuery>,
) -> Json<IpDescription> {
    let ip = addr.ip().to_canonical();

    if let Some(kind) = classify(ip) {
        return Json(IpDescription::bare(format!("{ip} - {kind}")));
    }

    let Some(isp) = &state.isp else {
        return Json(IpDescription::bare(ip.to_string()));
    };

    let unit = query
        .distance
        .as_deref()
        .and_then(|d| d.parse::<DistanceUnit>().ok())
        .unwrap_or(state.distance_unit);

    match isp.lookup(Some(ip)).await {
        Ok((raw, info)) => Json(IpDescription {
            processed_string: describe(&ip.to_string(), &info, state.server_location, unit),
            raw_isp_info: serde_json::from_str(&raw)
                .unwrap_or_else(|_| serde_json::Value::String(String::new())),
        }),
        Err(err) => {
            warn!(client_ip = %ip, error = %err, "ISP lookup failed");
            Json(IpDescription::bare(ip.to_string()))
        }
    }
}
