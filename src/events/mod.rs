mod event_manager;
mod event_store;
mod models;
mod sqlite_event_store;

pub use event_manager::{
    CheckInError, CheckInLookup, CheckInOutcome, EventError, EventManager, RsvpError, RsvpForm, RsvpOutcome,
    SubscribeForm, SubscribeOutcome, MAX_GUESTS,
};
pub use event_store::EventStore;
pub use models::*;
pub use sqlite_event_store::SqliteEventStore;
