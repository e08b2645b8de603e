//! Shared constants for end-to-end tests
//!
//! When test data changes (staff credentials, seeded events, etc.),
//! update only this file.

#![allow(dead_code)]

// ============================================================================
// Staff Credentials
// ============================================================================

/// Admin staff handle, holds every permission
pub const ADMIN_USER: &str = "admin";

/// Admin staff password
pub const ADMIN_PASS: &str = "adminpass123";

/// Organizer staff handle, can only run the check-in table
pub const ORGANIZER_USER: &str = "organizer";

/// Organizer staff password
pub const ORGANIZER_PASS: &str = "organizerpass123";

// ============================================================================
// Seeded Events
// ============================================================================

/// Published event starting a week from now
pub const UPCOMING_EVENT_SLUG: &str = "town-hall-on-transit";

/// Title the upcoming event slug is derived from
pub const UPCOMING_EVENT_TITLE: &str = "Town Hall on Transit";

/// Published event with room for three people
pub const SMALL_EVENT_SLUG: &str = "canvass-training";

/// Capacity of the small event
pub const SMALL_EVENT_CAPACITY: u32 = 3;

/// Published event that ended yesterday
pub const PAST_EVENT_SLUG: &str = "spring-kickoff";

/// Event that exists but is not published
pub const DRAFT_EVENT_SLUG: &str = "secret-planning-meeting";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// A mobile Safari user agent, classified as a mobile device
pub const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
