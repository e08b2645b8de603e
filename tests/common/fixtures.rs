//! Test fixtures: staff accounts and a handful of events
//!
//! Everything is created through the managers so the rows look exactly like
//! the ones the running server would write.

use super::constants::*;
use anyhow::Result;
use rally_server::events::{EventManager, NewEvent};
use rally_server::user::{UserManager, UserRole};
use serde_json::{json, Value};

const DAY_SECS: i64 = 24 * 60 * 60;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Creates the admin and organizer staff accounts with passwords and roles.
pub fn create_staff_users(user_manager: &UserManager) -> Result<()> {
    let admin_id = user_manager.add_user(ADMIN_USER)?;
    user_manager.create_password_credentials(ADMIN_USER, ADMIN_PASS)?;
    user_manager.add_user_role(admin_id, UserRole::Admin)?;

    let organizer_id = user_manager.add_user(ORGANIZER_USER)?;
    user_manager.create_password_credentials(ORGANIZER_USER, ORGANIZER_PASS)?;
    user_manager.add_user_role(organizer_id, UserRole::Organizer)?;
    Ok(())
}

fn event(title: &str, starts_at: i64, capacity: Option<u32>, published: bool) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        slug: None,
        description: format!("{} description", title),
        location_name: Some("Union Hall".to_string()),
        address: Some("12 Main St".to_string()),
        starts_at,
        ends_at: None,
        capacity,
        published,
    }
}

/// Seeds one upcoming, one small, one past and one draft event.
pub fn seed_events(event_manager: &EventManager) -> Result<()> {
    let now = now();
    event_manager.create_event(&event(UPCOMING_EVENT_TITLE, now + 7 * DAY_SECS, None, true))?;
    event_manager.create_event(&event(
        "Canvass Training",
        now + 3 * DAY_SECS,
        Some(SMALL_EVENT_CAPACITY),
        true,
    ))?;
    event_manager.create_event(&event("Spring Kickoff", now - DAY_SECS, None, true))?;
    event_manager.create_event(&event(
        "Secret Planning Meeting",
        now + 2 * DAY_SECS,
        None,
        false,
    ))?;
    Ok(())
}

/// A valid RSVP body for the given person.
pub fn rsvp_form(first_name: &str, phone: &str) -> Value {
    json!({
        "first_name": first_name,
        "last_name": "Tester",
        "email": format!("{}@example.org", first_name.to_lowercase()),
        "phone": phone,
        "zip": "02139",
    })
}
