//! Cache-Control for public reads

use axum::{
    body::Body,
    extract::State,
    http::{header::CACHE_CONTROL, HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};

/// Marks successful responses as cacheable for `max_age_sec` seconds.
/// Errors and responses that already set their own policy are left alone.
pub async fn http_cache(
    State(max_age_sec): State<usize>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let mut response = next.run(request).await;

    if response.status().is_success() && !response.headers().contains_key(CACHE_CONTROL) {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age_sec)) {
            response.headers_mut().insert(CACHE_CONTROL, value);
        }
    }

    response
}
