//! Staff routes: event management, the door check-in wizard and reporting.
//! Every handler takes a [`Session`] and checks one [`Permission`].

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::api_error::{internal_error, json_error, json_rejection, validation_error};
use super::metrics::record_check_in;
use super::session::Session;
use super::state::{GuardedAnalyticsManager, GuardedEventManager, GuardedUserManager, ServerState};
use super::ServerConfig;
use crate::analytics::{AnalyticsError, NewTrackingLink};
use crate::events::{
    Attendee, CheckInError, CheckInOutcome, EventError, EventPatch, NewEvent, RsvpForm,
    Subscriber,
};
use crate::user::{Permission, UserRole};
use crate::validation::format_phone;

const DEFAULT_SUBSCRIBERS_PAGE: usize = 100;
const MAX_SUBSCRIBERS_PAGE: usize = 1000;
const MAX_SUMMARY_DAYS: u64 = 3650;

fn require(session: &Session, permission: Permission) -> Result<(), Response> {
    if session.has_permission(permission) {
        Ok(())
    } else {
        warn!(
            "User {} lacks permission {:?}",
            session.user_id, permission
        );
        Err(StatusCode::FORBIDDEN.into_response())
    }
}

macro_rules! require_permission {
    ($session:expr, $permission:expr) => {
        if let Err(response) = require(&$session, $permission) {
            return response;
        }
    };
}

#[derive(Serialize)]
struct AttendeeView {
    #[serde(flatten)]
    attendee: Attendee,
    phone_display: String,
}

impl From<Attendee> for AttendeeView {
    fn from(attendee: Attendee) -> Self {
        let phone_display = format_phone(&attendee.phone);
        AttendeeView {
            attendee,
            phone_display,
        }
    }
}

#[derive(Serialize)]
struct CheckInView {
    attendee: AttendeeView,
    already_checked_in: bool,
}

impl From<CheckInOutcome> for CheckInView {
    fn from(outcome: CheckInOutcome) -> Self {
        CheckInView {
            attendee: outcome.attendee.into(),
            already_checked_in: outcome.already_checked_in,
        }
    }
}

#[derive(Deserialize)]
struct LookupBody {
    phone: String,
}

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Serialize)]
struct SubscribersPage {
    total: usize,
    subscribers: Vec<Subscriber>,
}

#[derive(Deserialize)]
struct SummaryQuery {
    days: Option<u64>,
}

#[derive(Serialize)]
struct StaffUser {
    handle: String,
    roles: Vec<UserRole>,
}

fn check_in_error(err: CheckInError) -> Response {
    match err {
        CheckInError::Invalid(err) => {
            record_check_in("invalid");
            validation_error(&err)
        }
        CheckInError::EventNotFound => {
            record_check_in("not_found");
            json_error(StatusCode::NOT_FOUND, "Event not found")
        }
        CheckInError::RsvpNotFound => {
            record_check_in("not_found");
            json_error(StatusCode::NOT_FOUND, "RSVP not found for this event")
        }
        CheckInError::RsvpCancelled => {
            record_check_in("cancelled");
            json_error(StatusCode::CONFLICT, "RSVP was cancelled")
        }
        CheckInError::Store(err) => {
            record_check_in("error");
            internal_error("Check-in failed", &err)
        }
    }
}

fn check_in_response(status: StatusCode, outcome: CheckInOutcome) -> Response {
    record_check_in(if outcome.already_checked_in {
        "already_checked_in"
    } else {
        "checked_in"
    });
    (status, Json(CheckInView::from(outcome))).into_response()
}

async fn create_event(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> Response {
    require_permission!(session, Permission::ManageEvents);
    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match event_manager.create_event(&event) {
        Ok(event) => {
            info!("User {} created event {}", session.user_id, event.slug);
            (StatusCode::CREATED, Json(event)).into_response()
        }
        Err(EventError::Invalid(err)) => validation_error(&err),
        Err(EventError::Store(err)) => internal_error("Failed to create event", &err),
    }
}

async fn list_events(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
) -> Response {
    require_permission!(session, Permission::ManageEvents);
    match event_manager.list_all_events() {
        Ok(events) => Json(events).into_response(),
        Err(err) => internal_error("Failed to list events", &err),
    }
}

async fn update_event(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
    body: Result<Json<EventPatch>, JsonRejection>,
) -> Response {
    require_permission!(session, Permission::ManageEvents);
    let Json(patch) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match event_manager.update_event(event_id, &patch) {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Event not found"),
        Err(EventError::Invalid(err)) => validation_error(&err),
        Err(EventError::Store(err)) => internal_error("Failed to update event", &err),
    }
}

async fn delete_event(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
) -> Response {
    require_permission!(session, Permission::ManageEvents);
    match event_manager.delete_event(event_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Event not found"),
        Err(err) => internal_error("Failed to delete event", &err),
    }
}

async fn list_attendees(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
) -> Response {
    require_permission!(session, Permission::ViewAttendees);
    match event_manager.list_attendees(event_id) {
        Ok(Some(attendees)) => {
            let attendees: Vec<AttendeeView> = attendees.into_iter().map(Into::into).collect();
            Json(attendees).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Event not found"),
        Err(err) => internal_error("Failed to list attendees", &err),
    }
}

async fn event_stats(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
) -> Response {
    require_permission!(session, Permission::ViewAttendees);
    match event_manager.event_stats(event_id) {
        Ok(Some(stats)) => Json(stats).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Event not found"),
        Err(err) => internal_error("Failed to compute event stats", &err),
    }
}

async fn lookup_by_phone(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
    body: Result<Json<LookupBody>, JsonRejection>,
) -> Response {
    require_permission!(session, Permission::CheckInAttendees);
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match event_manager.lookup_by_phone(event_id, &body.phone) {
        Ok(lookup) => Json(lookup).into_response(),
        Err(err) => check_in_error(err),
    }
}

async fn check_in(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path((event_id, rsvp_id)): Path<(usize, usize)>,
) -> Response {
    require_permission!(session, Permission::CheckInAttendees);
    match event_manager.check_in(event_id, rsvp_id) {
        Ok(outcome) => check_in_response(StatusCode::OK, outcome),
        Err(err) => check_in_error(err),
    }
}

async fn walk_in(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(event_id): Path<usize>,
    body: Result<Json<RsvpForm>, JsonRejection>,
) -> Response {
    require_permission!(session, Permission::CheckInAttendees);
    let Json(form) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match event_manager.walk_in(event_id, &form) {
        Ok(outcome) => check_in_response(StatusCode::CREATED, outcome),
        Err(err) => check_in_error(err),
    }
}

async fn cancel_rsvp(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Path(rsvp_id): Path<usize>,
) -> Response {
    require_permission!(session, Permission::ManageEvents);
    match event_manager.cancel_rsvp(rsvp_id) {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "RSVP not found"),
        Err(err) => internal_error("Failed to cancel rsvp", &err),
    }
}

async fn list_subscribers(
    session: Session,
    State(event_manager): State<GuardedEventManager>,
    Query(page): Query<PageQuery>,
) -> Response {
    require_permission!(session, Permission::ViewSubscribers);
    let limit = page
        .limit
        .unwrap_or(DEFAULT_SUBSCRIBERS_PAGE)
        .min(MAX_SUBSCRIBERS_PAGE);
    match event_manager.list_subscribers(limit, page.offset.unwrap_or(0)) {
        Ok((subscribers, total)) => Json(SubscribersPage { total, subscribers }).into_response(),
        Err(err) => internal_error("Failed to list subscribers", &err),
    }
}

async fn create_tracking_link(
    session: Session,
    State(analytics_manager): State<GuardedAnalyticsManager>,
    body: Result<Json<NewTrackingLink>, JsonRejection>,
) -> Response {
    require_permission!(session, Permission::ManageTrackingLinks);
    let Json(link) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(rejection),
    };
    match analytics_manager.create_tracking_link(&link, Some(session.user_id)) {
        Ok(link) => (StatusCode::CREATED, Json(link)).into_response(),
        Err(err @ AnalyticsError::Invalid { .. }) => {
            json_error(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err @ AnalyticsError::TokenTaken) => json_error(StatusCode::CONFLICT, &err.to_string()),
        Err(AnalyticsError::Store(err)) => internal_error("Failed to create tracking link", &err),
        Err(err) => internal_error("Failed to create tracking link", &anyhow::anyhow!(err)),
    }
}

async fn list_tracking_links(
    session: Session,
    State(analytics_manager): State<GuardedAnalyticsManager>,
) -> Response {
    require_permission!(session, Permission::ManageTrackingLinks);
    match analytics_manager.list_tracking_links() {
        Ok(links) => Json(links).into_response(),
        Err(err) => internal_error("Failed to list tracking links", &err),
    }
}

async fn analytics_summary(
    session: Session,
    State(analytics_manager): State<GuardedAnalyticsManager>,
    State(config): State<ServerConfig>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    require_permission!(session, Permission::ViewAnalytics);
    let days = query
        .days
        .unwrap_or(config.analytics_summary_days)
        .clamp(1, MAX_SUMMARY_DAYS);
    match analytics_manager.summary_for_days(days as u32) {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => internal_error("Failed to compute analytics summary", &err),
    }
}

async fn list_users(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Response {
    require_permission!(session, Permission::ManageUsers);
    let handles = match user_manager.get_all_user_handles() {
        Ok(handles) => handles,
        Err(err) => return internal_error("Failed to list users", &err),
    };
    let mut users = Vec::with_capacity(handles.len());
    for handle in handles {
        let roles = match user_manager.get_user_id(&handle) {
            Ok(Some(user_id)) => user_manager.get_user_roles(user_id),
            Ok(None) => continue,
            Err(err) => Err(err),
        };
        match roles {
            Ok(roles) => users.push(StaffUser { handle, roles }),
            Err(err) => return internal_error("Failed to load user roles", &err),
        }
    }
    Json(users).into_response()
}

/// Routes nested under `/v1/admin`.
pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/{id}", put(update_event).delete(delete_event))
        .route("/events/{id}/attendees", get(list_attendees))
        .route("/events/{id}/stats", get(event_stats))
        .route("/events/{id}/lookup", post(lookup_by_phone))
        .route("/events/{id}/checkin/{rsvp_id}", post(check_in))
        .route("/events/{id}/walkin", post(walk_in))
        .route("/rsvps/{id}/cancel", post(cancel_rsvp))
        .route("/subscribers", get(list_subscribers))
        .route(
            "/tracking-links",
            post(create_tracking_link).get(list_tracking_links),
        )
        .route("/analytics/summary", get(analytics_summary))
        .route("/users", get(list_users))
        .with_state(state)
}
