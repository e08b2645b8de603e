use super::event_store::EventStore;
use super::models::*;
use crate::validation::{
    normalize_phone, optional, slugify, validate_email, validate_event_times, validate_name,
    validate_zip, ValidationError,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum number of guests a single RSVP can bring along.
pub const MAX_GUESTS: u32 = 10;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RsvpForm {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub guests: u32,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tracking_token: Option<String>,
}

struct ValidRsvpForm {
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: String,
    zip: Option<String>,
    guests: u32,
}

impl RsvpForm {
    fn validate(&self) -> Result<ValidRsvpForm, ValidationError> {
        if self.guests > MAX_GUESTS {
            return Err(ValidationError::TooLong {
                field: "guests",
                max: MAX_GUESTS as usize,
            });
        }
        Ok(ValidRsvpForm {
            first_name: validate_name("first_name", &self.first_name)?,
            last_name: validate_name("last_name", &self.last_name)?,
            email: optional(self.email.as_deref(), validate_email)?,
            phone: normalize_phone(&self.phone)?,
            zip: optional(self.zip.as_deref(), validate_zip)?,
            guests: self.guests,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RsvpOutcome {
    pub rsvp: Rsvp,
    pub member: Member,
    /// False when the member already had a going RSVP for the event.
    pub created: bool,
}

#[derive(Debug, Error)]
pub enum RsvpError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Event not found")]
    NotFound,

    #[error("This event is no longer accepting RSVPs")]
    EventClosed,

    #[error("This event is full")]
    EventFull,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckInLookup {
    NotRegistered { phone: String },
    MemberWithoutRsvp { member: Member },
    Found { attendee: Attendee },
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckInOutcome {
    pub attendee: Attendee,
    pub already_checked_in: bool,
}

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Event not found")]
    EventNotFound,

    #[error("RSVP not found for this event")]
    RsvpNotFound,

    #[error("RSVP was cancelled")]
    RsvpCancelled,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<RsvpError> for CheckInError {
    fn from(err: RsvpError) -> Self {
        match err {
            RsvpError::Invalid(e) => CheckInError::Invalid(e),
            RsvpError::NotFound => CheckInError::EventNotFound,
            RsvpError::EventClosed => CheckInError::Store(anyhow::anyhow!("Event closed")),
            RsvpError::EventFull => CheckInError::Store(anyhow::anyhow!("Event full")),
            RsvpError::Store(e) => CheckInError::Store(e),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubscribeForm {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed { id: usize },
    AlreadySubscribed,
}

/// How capacity and event timing are enforced for an RSVP.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RsvpMode {
    Public,
    WalkIn,
}

pub struct EventManager {
    store: Arc<dyn EventStore>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl EventManager {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Creates an event, deriving its slug from the title when none is given.
    /// Taken slugs get a numeric suffix.
    pub fn create_event(&self, event: &NewEvent) -> Result<Event, EventError> {
        validate_name("title", &event.title)?;
        validate_event_times(event.starts_at, event.ends_at)?;

        let base = match event.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slugify(slug),
            _ => slugify(&event.title),
        };
        let mut slug = base.clone();
        let mut suffix = 2;
        while self.store.is_slug_taken(&slug)? {
            slug = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        let id = self.store.create_event(event, &slug)?;
        info!("Created event {} with slug {}", id, slug);
        Ok(self
            .store
            .get_event(id)?
            .ok_or_else(|| anyhow::anyhow!("Event {} vanished after creation", id))?)
    }

    pub fn list_upcoming_events(&self) -> Result<Vec<Event>> {
        self.store.list_events(&EventListFilter {
            upcoming_after: Some(now()),
            include_unpublished: false,
        })
    }

    /// Returns a published event by slug.
    pub fn get_public_event(&self, slug: &str) -> Result<Option<Event>> {
        Ok(self
            .store
            .get_event_by_slug(slug)?
            .filter(|event| event.published))
    }

    pub fn rsvp(&self, slug: &str, form: &RsvpForm) -> Result<RsvpOutcome, RsvpError> {
        let event = self.get_public_event(slug)?.ok_or(RsvpError::NotFound)?;
        self.rsvp_to_event(&event, form, RsvpMode::Public)
    }

    fn rsvp_to_event(
        &self,
        event: &Event,
        form: &RsvpForm,
        mode: RsvpMode,
    ) -> Result<RsvpOutcome, RsvpError> {
        let valid = form.validate()?;

        if mode == RsvpMode::Public && event.has_ended(now()) {
            return Err(RsvpError::EventClosed);
        }

        let member = self.resolve_member(&valid)?;
        let capacity = match mode {
            RsvpMode::Public => event.capacity,
            RsvpMode::WalkIn => None,
        };
        let new_rsvp = NewRsvp {
            event_id: event.id,
            member_id: member.id,
            guests: valid.guests,
            source: form.source.clone(),
            tracking_token: form.tracking_token.clone(),
        };

        let rsvp_id = match self.store.reserve_rsvp(&new_rsvp, capacity)? {
            RsvpReservation::Created(id) => id,
            RsvpReservation::Reactivated(id) => {
                info!("Re-activated rsvp {} for event {}", id, event.id);
                id
            }
            RsvpReservation::AlreadyGoing(rsvp) => {
                debug!(
                    "Member {} already going to event {}, rsvp {}",
                    member.id, event.id, rsvp.id
                );
                return Ok(RsvpOutcome {
                    rsvp,
                    member,
                    created: false,
                });
            }
            RsvpReservation::Full { going } => {
                info!(
                    "Rejecting rsvp to event {}: {} going, capacity {:?}",
                    event.id, going, event.capacity
                );
                return Err(RsvpError::EventFull);
            }
        };

        let rsvp = self
            .store
            .get_rsvp(rsvp_id)?
            .ok_or_else(|| anyhow::anyhow!("Rsvp {} vanished after write", rsvp_id))?;
        Ok(RsvpOutcome {
            rsvp,
            member,
            created: true,
        })
    }

    fn resolve_member(&self, form: &ValidRsvpForm) -> Result<Member> {
        if let Some(member) = self.store.find_member_by_phone(&form.phone)? {
            if (member.email.is_none() && form.email.is_some())
                || (member.zip.is_none() && form.zip.is_some())
            {
                self.store
                    .update_member_contact(member.id, form.email.as_deref(), form.zip.as_deref())?;
                if let Some(updated) = self.store.get_member(member.id)? {
                    return Ok(updated);
                }
            }
            return Ok(member);
        }

        let id = self.store.create_member(&NewMember {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            zip: form.zip.clone(),
        })?;
        debug!("Created member {}", id);
        self.store
            .get_member(id)?
            .ok_or_else(|| anyhow::anyhow!("Member {} vanished after creation", id))
    }

    /// Every event, drafts and past ones included.
    pub fn list_all_events(&self) -> Result<Vec<Event>> {
        self.store.list_events(&EventListFilter {
            upcoming_after: None,
            include_unpublished: true,
        })
    }

    pub fn get_event(&self, event_id: usize) -> Result<Option<Event>> {
        self.store.get_event(event_id)
    }

    pub fn update_event(
        &self,
        event_id: usize,
        patch: &EventPatch,
    ) -> Result<Option<Event>, EventError> {
        if let Some(title) = patch.title.as_deref() {
            validate_name("title", title)?;
        }
        let current = match self.store.get_event(event_id)? {
            Some(event) => event,
            None => return Ok(None),
        };
        validate_event_times(
            patch.starts_at.unwrap_or(current.starts_at),
            patch.ends_at.or(current.ends_at),
        )?;

        let updated = self.store.update_event(event_id, patch)?;
        if updated.is_some() {
            info!("Updated event {}", event_id);
        }
        Ok(updated)
    }

    pub fn delete_event(&self, event_id: usize) -> Result<bool> {
        let deleted = self.store.delete_event(event_id)?;
        if deleted {
            info!("Deleted event {}", event_id);
        }
        Ok(deleted)
    }

    /// Returns Ok(None) if the event does not exist.
    pub fn list_attendees(&self, event_id: usize) -> Result<Option<Vec<Attendee>>> {
        if self.store.get_event(event_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.list_attendees(event_id)?))
    }

    /// Returns Ok(None) if the event does not exist.
    pub fn event_stats(&self, event_id: usize) -> Result<Option<EventStats>> {
        if self.store.get_event(event_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.event_stats(event_id)?))
    }

    /// A page of subscribers, newest first, and the total count.
    pub fn list_subscribers(&self, limit: usize, offset: usize) -> Result<(Vec<Subscriber>, usize)> {
        Ok((
            self.store.list_subscribers(limit, offset)?,
            self.store.count_subscribers()?,
        ))
    }

    /// Returns false if the RSVP does not exist.
    pub fn cancel_rsvp(&self, rsvp_id: usize) -> Result<bool> {
        if self.store.get_rsvp(rsvp_id)?.is_none() {
            return Ok(false);
        }
        self.store.set_rsvp_status(rsvp_id, RsvpStatus::Cancelled)?;
        info!("Cancelled rsvp {}", rsvp_id);
        Ok(true)
    }

    pub fn lookup_by_phone(
        &self,
        event_id: usize,
        phone: &str,
    ) -> Result<CheckInLookup, CheckInError> {
        let phone = normalize_phone(phone)?;
        if self.store.get_event(event_id)?.is_none() {
            return Err(CheckInError::EventNotFound);
        }

        let member = match self.store.find_member_by_phone(&phone)? {
            Some(member) => member,
            None => return Ok(CheckInLookup::NotRegistered { phone }),
        };

        match self.store.find_rsvp(event_id, member.id)? {
            Some(rsvp) if rsvp.status == RsvpStatus::Going => {
                let attendee = self
                    .store
                    .get_attendee(rsvp.id)?
                    .ok_or(CheckInError::RsvpNotFound)?;
                Ok(CheckInLookup::Found { attendee })
            }
            _ => Ok(CheckInLookup::MemberWithoutRsvp { member }),
        }
    }

    pub fn check_in(&self, event_id: usize, rsvp_id: usize) -> Result<CheckInOutcome, CheckInError> {
        let rsvp = self
            .store
            .get_rsvp(rsvp_id)?
            .filter(|rsvp| rsvp.event_id == event_id)
            .ok_or(CheckInError::RsvpNotFound)?;
        if rsvp.status == RsvpStatus::Cancelled {
            warn!("Refusing check-in of cancelled rsvp {}", rsvp_id);
            return Err(CheckInError::RsvpCancelled);
        }

        let performed = self.store.mark_checked_in(rsvp_id, now())?;
        let attendee = self
            .store
            .get_attendee(rsvp_id)?
            .ok_or(CheckInError::RsvpNotFound)?;
        if performed {
            info!("Checked in rsvp {} at event {}", rsvp_id, event_id);
        }
        Ok(CheckInOutcome {
            attendee,
            already_checked_in: !performed,
        })
    }

    /// Registers someone showing up at the door and checks them in.
    pub fn walk_in(&self, event_id: usize, form: &RsvpForm) -> Result<CheckInOutcome, CheckInError> {
        let event = self
            .store
            .get_event(event_id)?
            .ok_or(CheckInError::EventNotFound)?;
        let mut form = form.clone();
        if form.source.is_none() {
            form.source = Some("walk_in".to_string());
        }
        let outcome = self.rsvp_to_event(&event, &form, RsvpMode::WalkIn)?;
        self.check_in(event_id, outcome.rsvp.id)
    }

    pub fn subscribe(&self, form: &SubscribeForm) -> Result<SubscribeOutcome, RsvpError> {
        let subscriber = NewSubscriber {
            email: validate_email(&form.email)?,
            first_name: optional(form.first_name.as_deref(), |name| {
                validate_name("first_name", name)
            })?,
            zip: optional(form.zip.as_deref(), validate_zip)?,
            source: form.source.clone(),
        };
        match self.store.insert_subscriber(&subscriber)? {
            Some(id) => {
                info!("New subscriber {}", id);
                Ok(SubscribeOutcome::Subscribed { id })
            }
            None => Ok(SubscribeOutcome::AlreadySubscribed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SqliteEventStore;

    fn manager() -> EventManager {
        EventManager::new(Arc::new(SqliteEventStore::in_memory().unwrap()))
    }

    fn upcoming_event(title: &str, capacity: Option<u32>) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            slug: None,
            description: String::new(),
            location_name: None,
            address: None,
            starts_at: now() + 86_400,
            ends_at: None,
            capacity,
            published: true,
        }
    }

    fn form(phone: &str) -> RsvpForm {
        RsvpForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.org".to_string()),
            phone: phone.to_string(),
            zip: Some("02139".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn slugs_are_unique() {
        let manager = manager();
        let a = manager.create_event(&upcoming_event("Town Hall", None)).unwrap();
        let b = manager.create_event(&upcoming_event("Town Hall", None)).unwrap();
        let c = manager.create_event(&upcoming_event("Town  Hall!", None)).unwrap();
        assert_eq!(a.slug, "town-hall");
        assert_eq!(b.slug, "town-hall-2");
        assert_eq!(c.slug, "town-hall-3");
    }

    #[test]
    fn rsvp_creates_member_and_is_idempotent() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();

        let first = manager.rsvp(&event.slug, &form("(555) 123-4567")).unwrap();
        assert!(first.created);
        assert_eq!(first.member.phone, "5551234567");

        let second = manager.rsvp(&event.slug, &form("+1 555 123 4567")).unwrap();
        assert!(!second.created);
        assert_eq!(second.rsvp.id, first.rsvp.id);
        assert_eq!(manager.store().count_going(event.id).unwrap(), 1);
    }

    #[test]
    fn rsvp_rejects_invalid_forms() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();

        let mut bad = form("555");
        let err = manager.rsvp(&event.slug, &bad).unwrap_err();
        assert!(matches!(err, RsvpError::Invalid(ValidationError::InvalidPhone)));

        bad = form("5551234567");
        bad.email = Some("nope".to_string());
        let err = manager.rsvp(&event.slug, &bad).unwrap_err();
        assert!(matches!(err, RsvpError::Invalid(ValidationError::InvalidEmail)));

        bad = form("5551234567");
        bad.guests = MAX_GUESTS + 1;
        assert!(matches!(
            manager.rsvp(&event.slug, &bad),
            Err(RsvpError::Invalid(_))
        ));
    }

    #[test]
    fn rsvp_to_unknown_unpublished_or_past_event() {
        let manager = manager();
        assert!(matches!(
            manager.rsvp("nope", &form("5551234567")),
            Err(RsvpError::NotFound)
        ));

        let mut draft = upcoming_event("Draft", None);
        draft.published = false;
        let draft = manager.create_event(&draft).unwrap();
        assert!(matches!(
            manager.rsvp(&draft.slug, &form("5551234567")),
            Err(RsvpError::NotFound)
        ));

        let mut past = upcoming_event("Past", None);
        past.starts_at = now() - 86_400;
        let past = manager.create_event(&past).unwrap();
        assert!(matches!(
            manager.rsvp(&past.slug, &form("5551234567")),
            Err(RsvpError::EventClosed)
        ));
    }

    #[test]
    fn capacity_counts_guests() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Small", Some(3))).unwrap();

        let mut with_guests = form("5551234567");
        with_guests.guests = 1;
        manager.rsvp(&event.slug, &with_guests).unwrap();
        manager.rsvp(&event.slug, &form("5551234568")).unwrap();
        assert!(matches!(
            manager.rsvp(&event.slug, &form("5551234569")),
            Err(RsvpError::EventFull)
        ));

        // Existing attendees still get their RSVP back.
        assert!(!manager.rsvp(&event.slug, &form("5551234568")).unwrap().created);
    }

    #[test]
    fn concurrent_rsvps_never_exceed_capacity() {
        let manager = Arc::new(manager());
        let event = manager.create_event(&upcoming_event("Small", Some(3))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                let slug = event.slug.clone();
                std::thread::spawn(move || {
                    manager
                        .rsvp(&slug, &form(&format!("555000000{}", i)))
                        .is_ok()
                })
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 3);
        assert_eq!(manager.store().count_going(event.id).unwrap(), 3);
    }

    #[test]
    fn event_times_are_validated() {
        let manager = manager();
        let mut far = upcoming_event("Far", None);
        far.starts_at = i64::MAX;
        assert!(matches!(
            manager.create_event(&far),
            Err(EventError::Invalid(ValidationError::InvalidTime { field: "starts_at" }))
        ));

        let mut backwards = upcoming_event("Backwards", None);
        backwards.ends_at = Some(backwards.starts_at - 1);
        assert!(matches!(
            manager.create_event(&backwards),
            Err(EventError::Invalid(ValidationError::EndsBeforeStart))
        ));

        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        assert!(matches!(
            manager.update_event(
                event.id,
                &EventPatch {
                    ends_at: Some(event.starts_at - 60),
                    ..Default::default()
                }
            ),
            Err(EventError::Invalid(ValidationError::EndsBeforeStart))
        ));
        assert!(matches!(
            manager.update_event(
                event.id,
                &EventPatch {
                    starts_at: Some(i64::MAX - 1),
                    ..Default::default()
                }
            ),
            Err(EventError::Invalid(ValidationError::InvalidTime { field: "starts_at" }))
        ));
        assert!(manager
            .update_event(
                999,
                &EventPatch {
                    starts_at: Some(-5),
                    ..Default::default()
                }
            )
            .unwrap()
            .is_none());

        let rsvp = manager.rsvp(&event.slug, &form("5551234567")).unwrap();
        assert!(rsvp.created);
    }

    #[test]
    fn cancelled_rsvp_is_reactivated() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        let first = manager.rsvp(&event.slug, &form("5551234567")).unwrap();
        manager.check_in(event.id, first.rsvp.id).unwrap();

        assert!(manager.cancel_rsvp(first.rsvp.id).unwrap());
        assert_eq!(manager.store().count_going(event.id).unwrap(), 0);

        let again = manager.rsvp(&event.slug, &form("5551234567")).unwrap();
        assert!(again.created);
        assert_eq!(again.rsvp.id, first.rsvp.id);
        assert_eq!(again.rsvp.status, RsvpStatus::Going);
        assert_eq!(again.rsvp.checked_in_at, None);

        assert!(!manager.cancel_rsvp(9999).unwrap());
    }

    #[test]
    fn existing_member_gets_missing_contact_filled() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        let mut bare = form("5551234567");
        bare.email = None;
        bare.zip = None;
        manager.rsvp(&event.slug, &bare).unwrap();

        let other = manager.create_event(&upcoming_event("Canvass", None)).unwrap();
        let outcome = manager.rsvp(&other.slug, &form("5551234567")).unwrap();
        assert_eq!(outcome.member.email.as_deref(), Some("ada@example.org"));
        assert_eq!(outcome.member.zip.as_deref(), Some("02139"));
    }

    #[test]
    fn lookup_walks_through_wizard_states() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        let other = manager.create_event(&upcoming_event("Other", None)).unwrap();

        assert!(matches!(
            manager.lookup_by_phone(event.id, "555-123-4567").unwrap(),
            CheckInLookup::NotRegistered { phone } if phone == "5551234567"
        ));

        manager.rsvp(&other.slug, &form("5551234567")).unwrap();
        assert!(matches!(
            manager.lookup_by_phone(event.id, "5551234567").unwrap(),
            CheckInLookup::MemberWithoutRsvp { .. }
        ));

        let outcome = manager.rsvp(&event.slug, &form("5551234567")).unwrap();
        match manager.lookup_by_phone(event.id, "5551234567").unwrap() {
            CheckInLookup::Found { attendee } => {
                assert_eq!(attendee.rsvp_id, outcome.rsvp.id);
                assert_eq!(attendee.checked_in_at, None);
            }
            other => panic!("unexpected lookup {:?}", other),
        }

        assert!(matches!(
            manager.lookup_by_phone(event.id, "12"),
            Err(CheckInError::Invalid(ValidationError::InvalidPhone))
        ));
        assert!(matches!(
            manager.lookup_by_phone(999, "5551234567"),
            Err(CheckInError::EventNotFound)
        ));
    }

    #[test]
    fn check_in_is_idempotent() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        let outcome = manager.rsvp(&event.slug, &form("5551234567")).unwrap();

        let first = manager.check_in(event.id, outcome.rsvp.id).unwrap();
        assert!(!first.already_checked_in);
        let at = first.attendee.checked_in_at.unwrap();

        let second = manager.check_in(event.id, outcome.rsvp.id).unwrap();
        assert!(second.already_checked_in);
        assert_eq!(second.attendee.checked_in_at, Some(at));

        assert_eq!(manager.store().event_stats(event.id).unwrap().checked_in_count, 1);
    }

    #[test]
    fn check_in_rejects_foreign_and_cancelled_rsvps() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        let other = manager.create_event(&upcoming_event("Other", None)).unwrap();
        let outcome = manager.rsvp(&event.slug, &form("5551234567")).unwrap();

        assert!(matches!(
            manager.check_in(other.id, outcome.rsvp.id),
            Err(CheckInError::RsvpNotFound)
        ));

        manager.cancel_rsvp(outcome.rsvp.id).unwrap();
        assert!(matches!(
            manager.check_in(event.id, outcome.rsvp.id),
            Err(CheckInError::RsvpCancelled)
        ));
    }

    #[test]
    fn walk_in_ignores_capacity_and_checks_in() {
        let manager = manager();
        let event = manager.create_event(&upcoming_event("Tiny", Some(1))).unwrap();
        manager.rsvp(&event.slug, &form("5551234567")).unwrap();

        let outcome = manager.walk_in(event.id, &form("5559876543")).unwrap();
        assert!(!outcome.already_checked_in);
        assert!(outcome.attendee.checked_in_at.is_some());

        let rsvp = manager.store().get_rsvp(outcome.attendee.rsvp_id).unwrap().unwrap();
        assert_eq!(rsvp.source.as_deref(), Some("walk_in"));
        assert_eq!(manager.store().count_going(event.id).unwrap(), 2);
    }

    #[test]
    fn duplicate_subscription_is_reported_once() {
        let manager = manager();
        let form = SubscribeForm {
            email: "Ada@Example.org".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            manager.subscribe(&form).unwrap(),
            SubscribeOutcome::Subscribed { .. }
        ));
        let again = SubscribeForm {
            email: "ada@example.org ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            manager.subscribe(&again).unwrap(),
            SubscribeOutcome::AlreadySubscribed
        );
        assert!(matches!(
            manager.subscribe(&SubscribeForm {
                email: "bad".to_string(),
                ..Default::default()
            }),
            Err(RsvpError::Invalid(ValidationError::InvalidEmail))
        ));
    }

    #[test]
    fn staff_views_require_existing_event() {
        let manager = manager();
        assert!(manager.list_attendees(42).unwrap().is_none());
        assert!(manager.event_stats(42).unwrap().is_none());

        let mut draft = upcoming_event("Draft", None);
        draft.published = false;
        let draft = manager.create_event(&draft).unwrap();
        let event = manager.create_event(&upcoming_event("Rally", None)).unwrap();
        manager.rsvp(&event.slug, &form("555-123-4567")).unwrap();

        assert_eq!(manager.list_all_events().unwrap().len(), 2);
        assert_eq!(manager.list_upcoming_events().unwrap().len(), 1);
        assert_eq!(manager.list_attendees(event.id).unwrap().unwrap().len(), 1);
        assert_eq!(manager.event_stats(event.id).unwrap().unwrap().rsvp_count, 1);

        assert!(manager
            .update_event(
                draft.id,
                &EventPatch {
                    title: Some(" ".to_string()),
                    ..Default::default()
                }
            )
            .is_err());
        let published = manager
            .update_event(
                draft.id,
                &EventPatch {
                    published: Some(true),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(published.published);

        assert!(manager.delete_event(draft.id).unwrap());
        assert!(!manager.delete_event(draft.id).unwrap());
    }
}
