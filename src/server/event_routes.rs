//! Public event browsing, RSVP and newsletter sign-up.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};

use super::api_error::{internal_error, json_error, json_rejection, validation_error};
use super::http_cache;
use super::metrics::{record_rsvp, record_subscription};
use super::state::{GuardedEventManager, ServerState};
use crate::events::{RsvpError, RsvpForm, RsvpStatus, SubscribeForm, SubscribeOutcome};

/// Never carries member details, anyone can submit any phone number.
#[derive(Serialize)]
struct RsvpResponse {
    rsvp_id: usize,
    event_id: usize,
    status: RsvpStatus,
    guests: u32,
    created: bool,
}

#[derive(Serialize)]
struct SubscribeResponse {
    status: &'static str,
}

async fn list_events(State(event_manager): State<GuardedEventManager>) -> Response {
    match event_manager.list_upcoming_events() {
        Ok(events) => Json(events).into_response(),
        Err(err) => internal_error("Failed to list events", &err),
    }
}

async fn get_event(
    State(event_manager): State<GuardedEventManager>,
    Path(slug): Path<String>,
) -> Response {
    match event_manager.get_public_event(&slug) {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Event not found"),
        Err(err) => internal_error("Failed to load event", &err),
    }
}

async fn post_rsvp(
    State(event_manager): State<GuardedEventManager>,
    Path(slug): Path<String>,
    body: Result<Json<RsvpForm>, JsonRejection>,
) -> Response {
    let Json(form) = match body {
        Ok(body) => body,
        Err(rejection) => {
            record_rsvp("invalid");
            return json_rejection(rejection);
        }
    };
    match event_manager.rsvp(&slug, &form) {
        Ok(outcome) => {
            let status = if outcome.created {
                record_rsvp("created");
                StatusCode::CREATED
            } else {
                record_rsvp("existing");
                StatusCode::OK
            };
            let body = RsvpResponse {
                rsvp_id: outcome.rsvp.id,
                event_id: outcome.rsvp.event_id,
                status: outcome.rsvp.status,
                guests: outcome.rsvp.guests,
                created: outcome.created,
            };
            (status, Json(body)).into_response()
        }
        Err(RsvpError::Invalid(err)) => {
            debug!("Rejected rsvp to {}: {}", slug, err);
            record_rsvp("invalid");
            validation_error(&err)
        }
        Err(RsvpError::NotFound) => {
            record_rsvp("not_found");
            json_error(StatusCode::NOT_FOUND, "Event not found")
        }
        Err(err @ RsvpError::EventClosed) => {
            record_rsvp("closed");
            json_error(StatusCode::CONFLICT, &err.to_string())
        }
        Err(err @ RsvpError::EventFull) => {
            record_rsvp("full");
            json_error(StatusCode::CONFLICT, &err.to_string())
        }
        Err(RsvpError::Store(err)) => {
            record_rsvp("error");
            internal_error("Failed to store rsvp", &err)
        }
    }
}

async fn post_subscribe(
    State(event_manager): State<GuardedEventManager>,
    body: Result<Json<SubscribeForm>, JsonRejection>,
) -> Response {
    let Json(form) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match event_manager.subscribe(&form) {
        Ok(SubscribeOutcome::Subscribed { id }) => {
            info!("Subscriber {} signed up", id);
            record_subscription("subscribed");
            (
                StatusCode::CREATED,
                Json(SubscribeResponse {
                    status: "subscribed",
                }),
            )
                .into_response()
        }
        Ok(SubscribeOutcome::AlreadySubscribed) => {
            record_subscription("already_subscribed");
            Json(SubscribeResponse {
                status: "already_subscribed",
            })
            .into_response()
        }
        Err(RsvpError::Invalid(err)) => {
            record_subscription("invalid");
            validation_error(&err)
        }
        Err(RsvpError::Store(err)) => internal_error("Failed to store subscriber", &err),
        Err(err) => internal_error("Unexpected subscription failure", &anyhow::anyhow!(err)),
    }
}

/// Routes nested under `/v1`.
pub fn make_event_routes(state: ServerState) -> Router {
    let cached_reads: Router = Router::new()
        .route("/events", get(list_events))
        .route("/events/{slug}", get(get_event))
        .layer(middleware::from_fn_with_state(
            state.config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    let writes: Router = Router::new()
        .route("/events/{slug}/rsvp", post(post_rsvp))
        .route("/subscribe", post(post_subscribe))
        .with_state(state);

    cached_reads.merge(writes)
}
