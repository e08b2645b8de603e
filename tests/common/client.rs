//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all rally-server endpoints.
//!
//! When API routes or request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client, the way a visitor browses.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as the admin staff user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::authenticated_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    /// Creates a client pre-authenticated as the organizer staff user
    pub async fn authenticated_organizer(base_url: String) -> Self {
        Self::authenticated_as(base_url, ORGANIZER_USER, ORGANIZER_PASS).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/login"))
            .json(&json!({
                "user_handle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(self.url("/v1/auth/logout"))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Public Event Endpoints
    // ========================================================================

    /// GET /v1/events
    pub async fn list_events(&self) -> Response {
        self.client
            .get(self.url("/v1/events"))
            .send()
            .await
            .expect("List events request failed")
    }

    /// GET /v1/events/{slug}
    pub async fn get_event(&self, slug: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/events/{}", slug)))
            .send()
            .await
            .expect("Get event request failed")
    }

    /// POST /v1/events/{slug}/rsvp
    pub async fn rsvp(&self, slug: &str, form: &Value) -> Response {
        self.client
            .post(self.url(&format!("/v1/events/{}/rsvp", slug)))
            .json(form)
            .send()
            .await
            .expect("Rsvp request failed")
    }

    /// POST /v1/subscribe
    pub async fn subscribe(&self, body: &Value) -> Response {
        self.client
            .post(self.url("/v1/subscribe"))
            .json(body)
            .send()
            .await
            .expect("Subscribe request failed")
    }

    // ========================================================================
    // Analytics Beacons and Tracking Links
    // ========================================================================

    /// POST /v1/analytics/pageview with the given User-Agent
    pub async fn page_view(&self, beacon: &Value, user_agent: &str) -> Response {
        self.client
            .post(self.url("/v1/analytics/pageview"))
            .header(reqwest::header::USER_AGENT, user_agent)
            .json(beacon)
            .send()
            .await
            .expect("Page view request failed")
    }

    /// PATCH /v1/analytics/pageview/{id}
    pub async fn update_page_view(&self, id: u64, update: &Value) -> Response {
        self.client
            .patch(self.url(&format!("/v1/analytics/pageview/{}", id)))
            .json(update)
            .send()
            .await
            .expect("Page view update request failed")
    }

    /// POST /v1/analytics/form-event
    pub async fn form_event(&self, beacon: &Value) -> Response {
        self.client
            .post(self.url("/v1/analytics/form-event"))
            .json(beacon)
            .send()
            .await
            .expect("Form event request failed")
    }

    /// GET /t/{token}, redirects are not followed
    pub async fn follow_tracking_link(&self, token: &str) -> Response {
        self.client
            .get(self.url(&format!("/t/{}", token)))
            .send()
            .await
            .expect("Tracking link request failed")
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// POST /v1/admin/events
    pub async fn admin_create_event(&self, event: &Value) -> Response {
        self.client
            .post(self.url("/v1/admin/events"))
            .json(event)
            .send()
            .await
            .expect("Create event request failed")
    }

    /// GET /v1/admin/events
    pub async fn admin_list_events(&self) -> Response {
        self.client
            .get(self.url("/v1/admin/events"))
            .send()
            .await
            .expect("Admin list events request failed")
    }

    /// PUT /v1/admin/events/{id}
    pub async fn admin_update_event(&self, id: usize, patch: &Value) -> Response {
        self.client
            .put(self.url(&format!("/v1/admin/events/{}", id)))
            .json(patch)
            .send()
            .await
            .expect("Update event request failed")
    }

    /// DELETE /v1/admin/events/{id}
    pub async fn admin_delete_event(&self, id: usize) -> Response {
        self.client
            .delete(self.url(&format!("/v1/admin/events/{}", id)))
            .send()
            .await
            .expect("Delete event request failed")
    }

    /// GET /v1/admin/events/{id}/attendees
    pub async fn admin_attendees(&self, event_id: usize) -> Response {
        self.client
            .get(self.url(&format!("/v1/admin/events/{}/attendees", event_id)))
            .send()
            .await
            .expect("Attendees request failed")
    }

    /// GET /v1/admin/events/{id}/stats
    pub async fn admin_event_stats(&self, event_id: usize) -> Response {
        self.client
            .get(self.url(&format!("/v1/admin/events/{}/stats", event_id)))
            .send()
            .await
            .expect("Event stats request failed")
    }

    /// POST /v1/admin/events/{id}/lookup
    pub async fn admin_lookup(&self, event_id: usize, phone: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/admin/events/{}/lookup", event_id)))
            .json(&json!({ "phone": phone }))
            .send()
            .await
            .expect("Lookup request failed")
    }

    /// POST /v1/admin/events/{id}/checkin/{rsvp_id}
    pub async fn admin_check_in(&self, event_id: usize, rsvp_id: u64) -> Response {
        self.client
            .post(self.url(&format!(
                "/v1/admin/events/{}/checkin/{}",
                event_id, rsvp_id
            )))
            .send()
            .await
            .expect("Check-in request failed")
    }

    /// POST /v1/admin/events/{id}/walkin
    pub async fn admin_walk_in(&self, event_id: usize, form: &Value) -> Response {
        self.client
            .post(self.url(&format!("/v1/admin/events/{}/walkin", event_id)))
            .json(form)
            .send()
            .await
            .expect("Walk-in request failed")
    }

    /// POST /v1/admin/rsvps/{id}/cancel
    pub async fn admin_cancel_rsvp(&self, rsvp_id: u64) -> Response {
        self.client
            .post(self.url(&format!("/v1/admin/rsvps/{}/cancel", rsvp_id)))
            .send()
            .await
            .expect("Cancel rsvp request failed")
    }

    /// GET /v1/admin/subscribers
    pub async fn admin_subscribers(&self, limit: Option<usize>, offset: Option<usize>) -> Response {
        let mut query = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        self.client
            .get(self.url("/v1/admin/subscribers"))
            .query(&query)
            .send()
            .await
            .expect("Subscribers request failed")
    }

    /// POST /v1/admin/tracking-links
    pub async fn admin_create_tracking_link(&self, link: &Value) -> Response {
        self.client
            .post(self.url("/v1/admin/tracking-links"))
            .json(link)
            .send()
            .await
            .expect("Create tracking link request failed")
    }

    /// GET /v1/admin/tracking-links
    pub async fn admin_tracking_links(&self) -> Response {
        self.client
            .get(self.url("/v1/admin/tracking-links"))
            .send()
            .await
            .expect("Tracking links request failed")
    }

    /// GET /v1/admin/analytics/summary
    pub async fn admin_analytics_summary(&self, days: Option<u64>) -> Response {
        let mut request = self.client.get(self.url("/v1/admin/analytics/summary"));
        if let Some(days) = days {
            request = request.query(&[("days", days)]);
        }
        request
            .send()
            .await
            .expect("Analytics summary request failed")
    }

    /// GET /v1/admin/users
    pub async fn admin_users(&self) -> Response {
        self.client
            .get(self.url("/v1/admin/users"))
            .send()
            .await
            .expect("Users request failed")
    }
}
