use super::models::*;
use anyhow::Result;

pub trait EventStore: Send + Sync {
    /// Inserts a new event with an already resolved, unique slug.
    /// Returns the new event id.
    fn create_event(&self, event: &NewEvent, slug: &str) -> Result<usize>;

    /// Returns Ok(None) if the event does not exist.
    fn get_event(&self, event_id: usize) -> Result<Option<Event>>;

    /// Returns Ok(None) if no event has the given slug.
    fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>>;

    /// Returns true if a slug is already taken by some event.
    fn is_slug_taken(&self, slug: &str) -> Result<bool>;

    /// Applies the non-empty fields of the patch.
    /// Returns Ok(None) if the event does not exist.
    fn update_event(&self, event_id: usize, patch: &EventPatch) -> Result<Option<Event>>;

    /// Deletes an event and, through cascading, its RSVPs.
    /// Returns false if the event did not exist.
    fn delete_event(&self, event_id: usize) -> Result<bool>;

    /// Events sorted by start time, ascending.
    fn list_events(&self, filter: &EventListFilter) -> Result<Vec<Event>>;

    /// Returns Ok(None) if no member has the given canonical phone.
    fn find_member_by_phone(&self, phone: &str) -> Result<Option<Member>>;

    fn get_member(&self, member_id: usize) -> Result<Option<Member>>;

    /// Creates a member, fails if the phone is already registered.
    fn create_member(&self, member: &NewMember) -> Result<usize>;

    /// Fills in email and zip only where the member doesn't have one yet.
    fn update_member_contact(
        &self,
        member_id: usize,
        email: Option<&str>,
        zip: Option<&str>,
    ) -> Result<()>;

    fn get_rsvp(&self, rsvp_id: usize) -> Result<Option<Rsvp>>;

    /// Returns the RSVP of a member to an event, whatever its status.
    fn find_rsvp(&self, event_id: usize, member_id: usize) -> Result<Option<Rsvp>>;

    /// Creates the member's RSVP, or re-activates their cancelled one as a
    /// fresh registration, in a single transaction. With a capacity the write
    /// only happens if the going headcount plus this party still fits.
    fn reserve_rsvp(&self, rsvp: &NewRsvp, capacity: Option<u32>) -> Result<RsvpReservation>;

    fn set_rsvp_status(&self, rsvp_id: usize, status: RsvpStatus) -> Result<()>;

    /// Number of RSVPs with status going, guests included.
    fn count_going(&self, event_id: usize) -> Result<usize>;

    fn list_attendees(&self, event_id: usize) -> Result<Vec<Attendee>>;

    fn get_attendee(&self, rsvp_id: usize) -> Result<Option<Attendee>>;

    fn event_stats(&self, event_id: usize) -> Result<EventStats>;

    /// Sets the check-in timestamp only if it was not set yet.
    /// Returns true if this call performed the check-in.
    fn mark_checked_in(&self, rsvp_id: usize, at: i64) -> Result<bool>;

    /// Returns Ok(None) if the email is already subscribed.
    fn insert_subscriber(&self, subscriber: &NewSubscriber) -> Result<Option<usize>>;

    fn list_subscribers(&self, limit: usize, offset: usize) -> Result<Vec<Subscriber>>;

    fn count_subscribers(&self) -> Result<usize>;
}
