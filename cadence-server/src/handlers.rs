use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderName,
    RANGE,
};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use cadence_engine::{MediaStream, SearchResults, ServiceStatus, StreamOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaParams {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub id: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub service: ServiceStatus,
}

#[derive(Debug, Serialize)]
pub struct DirectResponse {
    pub url: String,
    pub content_type: String,
    pub resolved_at: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: state.service.status(),
    })
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("No query provided"))?;

    let results = state.service.search(query).await?;
    Ok(Json(results))
}

pub async fn direct(
    State(state): State<AppState>,
    Query(params): Query<MediaParams>,
) -> Result<Json<DirectResponse>, ApiError> {
    let id = required_id(params.id.as_deref())?;
    let media = state.service.resolve(id).await?;
    Ok(Json(DirectResponse {
        url: media.media_url,
        content_type: media.content_type,
        resolved_at: media.resolved_at_utc,
    }))
}

pub async fn stream(
    State(state): State<AppState>,
    Query(params): Query<MediaParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = required_id(params.id.as_deref())?;
    let mut options = StreamOptions::playback();
    if let Some(range) = client_range(&headers) {
        options = options.with_range(range);
    }

    let media = state.service.open_stream(id, options).await?;
    Ok(media_response(media))
}

pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = required_id(params.id.as_deref())?;
    let mut options = StreamOptions::download(params.filename);
    if let Some(range) = client_range(&headers) {
        options = options.with_range(range);
    }

    let media = state.service.open_stream(id, options).await?;
    Ok(media_response(media))
}

fn required_id(id: Option<&str>) -> Result<&str, ApiError> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("No id provided"))
}

fn client_range(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Copy the upstream head onto the response and hand the chunk stream to
/// the body. Nothing is buffered here.
fn media_response(media: MediaStream) -> Response {
    let MediaStream {
        id,
        content_disposition,
        stream,
    } = media;
    let head = stream.head().clone();
    debug!(id = %id, status = %head.status, "Streaming media");

    let mut response = Body::from_stream(stream).into_response();
    *response.status_mut() = head.status;

    let headers = response.headers_mut();
    set_header(headers, CONTENT_TYPE, Some(head.content_type));
    set_header(headers, CONTENT_LENGTH, head.content_length.map(|len| len.to_string()));
    set_header(headers, CONTENT_RANGE, head.content_range);
    set_header(headers, ACCEPT_RANGES, head.accept_ranges);
    set_header(headers, CONTENT_DISPOSITION, content_disposition);
    response
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: Option<String>) {
    let Some(value) = value else {
        return;
    };
    match HeaderValue::try_from(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!(header = %name, error = %e, "Dropping invalid response header"),
    }
}
