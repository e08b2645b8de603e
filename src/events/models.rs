use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: usize,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location_name: Option<String>,
    pub address: Option<String>,
    /// Unix seconds.
    pub starts_at: i64,
    pub ends_at: Option<i64>,
    pub capacity: Option<u32>,
    pub published: bool,
    pub created: i64,
}

impl Event {
    /// An event without an explicit end is considered over three hours after it starts.
    pub const DEFAULT_DURATION_SECS: i64 = 3 * 60 * 60;

    pub fn effective_end(&self) -> i64 {
        self.ends_at
            .unwrap_or(self.starts_at.saturating_add(Self::DEFAULT_DURATION_SECS))
    }

    pub fn has_ended(&self, now: i64) -> bool {
        now > self.effective_end()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub starts_at: i64,
    #[serde(default)]
    pub ends_at: Option<i64>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location_name: Option<String>,
    pub address: Option<String>,
    pub starts_at: Option<i64>,
    pub ends_at: Option<i64>,
    pub capacity: Option<u32>,
    pub published: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct EventListFilter {
    /// Only events that have not ended before this timestamp.
    pub upcoming_after: Option<i64>,
    pub include_unpublished: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// Canonical 10-digit phone, unique across members.
    pub phone: String,
    pub zip: Option<String>,
    pub created: i64,
}

#[derive(Clone, Debug)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub zip: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Going,
    Cancelled,
}

impl RsvpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RsvpStatus::Going => "going",
            RsvpStatus::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "going" => Some(RsvpStatus::Going),
            "cancelled" => Some(RsvpStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rsvp {
    pub id: usize,
    pub event_id: usize,
    pub member_id: usize,
    pub status: RsvpStatus,
    pub guests: u32,
    pub source: Option<String>,
    pub tracking_token: Option<String>,
    pub checked_in_at: Option<i64>,
    pub created: i64,
}

#[derive(Clone, Debug)]
pub struct NewRsvp {
    pub event_id: usize,
    pub member_id: usize,
    pub guests: u32,
    pub source: Option<String>,
    pub tracking_token: Option<String>,
}

/// What [`EventStore::reserve_rsvp`](super::EventStore::reserve_rsvp) did.
#[derive(Clone, Debug, PartialEq)]
pub enum RsvpReservation {
    Created(usize),
    /// A cancelled RSVP was switched back to going.
    Reactivated(usize),
    AlreadyGoing(Rsvp),
    /// Nothing was written, `going` is the current headcount.
    Full { going: usize },
}

/// An RSVP row joined with the member it belongs to.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Attendee {
    pub rsvp_id: usize,
    pub event_id: usize,
    pub member_id: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub status: RsvpStatus,
    pub guests: u32,
    pub checked_in_at: Option<i64>,
    pub created: i64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct EventStats {
    pub rsvp_count: usize,
    pub checked_in_count: usize,
    pub guests_count: usize,
    pub cancelled_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subscriber {
    pub id: usize,
    pub email: String,
    pub first_name: Option<String>,
    pub zip: Option<String>,
    pub source: Option<String>,
    pub created: i64,
}

#[derive(Clone, Debug)]
pub struct NewSubscriber {
    pub email: String,
    pub first_name: Option<String>,
    pub zip: Option<String>,
    pub source: Option<String>,
}
