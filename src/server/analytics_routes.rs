//! Analytics beacons and tracking link redirects.
//!
//! The frontend fires these and forgets, so failures only carry a short
//! message and are otherwise just logged.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, warn};

use super::api_error::{internal_error, json_error, json_rejection};
use super::metrics::{record_form_event, record_page_view};
use super::state::{GuardedAnalyticsManager, ServerState};
use crate::analytics::{
    parse_user_agent, AnalyticsError, FormEventBeacon, PageViewBeacon, PageViewUpdate,
};

/// Beacons are tiny, anything bigger is not coming from our frontend.
pub const MAX_BEACON_BODY_BYTES: usize = 16 * 1024;

#[derive(Serialize)]
struct IdResponse {
    id: usize,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

fn analytics_error(context: &str, err: AnalyticsError) -> Response {
    match err {
        AnalyticsError::Invalid { .. } | AnalyticsError::UnknownEventType(_) => {
            debug!("{}: {}", context, err);
            json_error(StatusCode::BAD_REQUEST, &err.to_string())
        }
        AnalyticsError::NotFound => json_error(StatusCode::NOT_FOUND, "Not found"),
        AnalyticsError::TokenTaken => json_error(StatusCode::CONFLICT, &err.to_string()),
        AnalyticsError::Store(err) => internal_error(context, &err),
    }
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
}

async fn post_page_view(
    State(analytics_manager): State<GuardedAnalyticsManager>,
    headers: HeaderMap,
    body: Result<Json<PageViewBeacon>, JsonRejection>,
) -> Response {
    let Json(beacon) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    let user_agent = user_agent(&headers);
    match analytics_manager.record_page_view(&beacon, user_agent) {
        Ok(id) => {
            let device = parse_user_agent(user_agent.unwrap_or_default()).device_type;
            record_page_view(device.as_str());
            (StatusCode::CREATED, Json(IdResponse { id })).into_response()
        }
        Err(err) => analytics_error("Failed to record page view", err),
    }
}

async fn patch_page_view(
    State(analytics_manager): State<GuardedAnalyticsManager>,
    Path(id): Path<usize>,
    body: Result<Json<PageViewUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match analytics_manager.update_page_view(id, &update) {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(err) => analytics_error("Failed to update page view", err),
    }
}

async fn post_form_event(
    State(analytics_manager): State<GuardedAnalyticsManager>,
    body: Result<Json<FormEventBeacon>, JsonRejection>,
) -> Response {
    let Json(beacon) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match analytics_manager.record_form_event(&beacon) {
        Ok(_) => {
            record_form_event(beacon.event_type.trim());
            (StatusCode::CREATED, Json(OkResponse { ok: true })).into_response()
        }
        Err(err) => analytics_error("Failed to record form event", err),
    }
}

async fn follow_tracking_link(
    State(analytics_manager): State<GuardedAnalyticsManager>,
    Path(token): Path<String>,
) -> Response {
    let location = match analytics_manager.redirect_location(&token) {
        Ok(location) => location,
        Err(err) => {
            warn!("Failed to resolve tracking link {}: {:#}", token, err);
            "/".to_string()
        }
    };
    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => (
            StatusCode::FOUND,
            [(header::LOCATION, HeaderValue::from_static("/"))],
        )
            .into_response(),
    }
}

/// Beacon routes nested under `/v1/analytics`.
pub fn make_analytics_routes(state: ServerState) -> Router {
    Router::new()
        .route("/pageview", post(post_page_view))
        .route("/pageview/{id}", patch(patch_page_view))
        .route("/form-event", post(post_form_event))
        .layer(DefaultBodyLimit::max(MAX_BEACON_BODY_BYTES))
        .with_state(state)
}

/// The short `/t/{token}` links printed on flyers and shared on social media.
pub fn make_tracking_redirect_routes(state: ServerState) -> Router {
    Router::new()
        .route("/t/{token}", get(follow_tracking_link))
        .with_state(state)
}
