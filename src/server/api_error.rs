//! JSON error bodies shared by the route modules.

use crate::validation::ValidationError;
use axum::{
    extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse,
    response::Response, Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error};

lazy_static! {
    static ref MISSING_FIELD: Regex = Regex::new(r"missing field `([A-Za-z0-9_]+)`").unwrap();
    static ref FIELD_PATH: Regex = Regex::new(r"target type: ([A-Za-z0-9_]+)(\[\d+\])?: ").unwrap();
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

pub fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message,
            field: None,
        }),
    )
        .into_response()
}

pub fn validation_error(err: &ValidationError) -> Response {
    let message = err.to_string();
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: &message,
            field: Some(err.field()),
        }),
    )
        .into_response()
}

/// The form field a body deserialization error refers to, if any.
fn rejected_field(message: &str) -> Option<&str> {
    MISSING_FIELD
        .captures(message)
        .or_else(|| FIELD_PATH.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Malformed or incomplete JSON bodies get the same error shape as
/// validation failures.
pub fn json_rejection(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    debug!("Rejected request body: {}", message);
    let status = match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            StatusCode::BAD_REQUEST
        }
        other => other.status(),
    };
    (
        status,
        Json(ErrorBody {
            error: &message,
            field: rejected_field(&message),
        }),
    )
        .into_response()
}

/// Logs the cause and answers with a generic 500.
pub fn internal_error(context: &str, err: &anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong, please try again later",
    )
}
