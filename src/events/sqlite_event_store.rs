use super::event_store::EventStore;
use super::models::*;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_in_memory_db, open_versioned_db, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// V 0
const EVENT_TABLE_V_0: Table = Table {
    name: "event",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("slug", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("location_name", &SqlType::Text),
        sqlite_column!("address", &SqlType::Text),
        sqlite_column!("starts_at", &SqlType::Integer, non_null = true),
        sqlite_column!("ends_at", &SqlType::Integer),
        sqlite_column!("capacity", &SqlType::Integer),
        sqlite_column!(
            "published",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_event_starts_at", "starts_at")],
    unique_constraints: &[],
};
const MEMBER_TABLE_V_0: Table = Table {
    name: "member",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("first_name", &SqlType::Text, non_null = true),
        sqlite_column!("last_name", &SqlType::Text, non_null = true),
        sqlite_column!("email", &SqlType::Text),
        sqlite_column!("phone", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("zip", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_member_phone", "phone")],
    unique_constraints: &[],
};
const RSVP_TABLE_V_0: Table = Table {
    name: "rsvp",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "event_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "event",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "member_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "member",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!(
            "guests",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("source", &SqlType::Text),
        sqlite_column!("checked_in_at", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_rsvp_event_id", "event_id")],
    unique_constraints: &[&["event_id", "member_id"]],
};
const SUBSCRIBER_TABLE_V_0: Table = Table {
    name: "subscriber",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("first_name", &SqlType::Text),
        sqlite_column!("zip", &SqlType::Text),
        sqlite_column!("source", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// V 1
const RSVP_TABLE_V_1: Table = Table {
    name: "rsvp",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "event_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "event",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "member_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "member",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!(
            "guests",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("source", &SqlType::Text),
        sqlite_column!("checked_in_at", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("tracking_token", &SqlType::Text),
    ],
    indices: &[("idx_rsvp_event_id", "event_id")],
    unique_constraints: &[&["event_id", "member_id"]],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            EVENT_TABLE_V_0,
            MEMBER_TABLE_V_0,
            RSVP_TABLE_V_0,
            SUBSCRIBER_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            EVENT_TABLE_V_0,
            MEMBER_TABLE_V_0,
            RSVP_TABLE_V_1,
            SUBSCRIBER_TABLE_V_0,
        ],
        migration: Some(|conn: &Connection| {
            conn.execute("ALTER TABLE rsvp ADD COLUMN tracking_token TEXT", [])?;
            Ok(())
        }),
    },
];

const EVENT_COLUMNS: &str = "id, slug, title, description, location_name, address, starts_at, ends_at, capacity, published, created";
const MEMBER_COLUMNS: &str = "id, first_name, last_name, email, phone, zip, created";
const RSVP_COLUMNS: &str =
    "id, event_id, member_id, status, guests, source, tracking_token, checked_in_at, created";
const ATTENDEE_SELECT: &str = "SELECT r.id, r.event_id, r.member_id, m.first_name, m.last_name, m.email, m.phone, r.status, r.guests, r.checked_in_at, r.created FROM rsvp r JOIN member m ON m.id = r.member_id";

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location_name: row.get(4)?,
        address: row.get(5)?,
        starts_at: row.get(6)?,
        ends_at: row.get(7)?,
        capacity: row.get(8)?,
        published: row.get::<_, i64>(9)? != 0,
        created: row.get(10)?,
    })
}

fn member_from_row(row: &Row) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        zip: row.get(5)?,
        created: row.get(6)?,
    })
}

fn status_from_column(row: &Row, index: usize) -> rusqlite::Result<RsvpStatus> {
    let raw: String = row.get(index)?;
    RsvpStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("Unknown rsvp status {}", raw).into(),
        )
    })
}

fn rsvp_from_row(row: &Row) -> rusqlite::Result<Rsvp> {
    Ok(Rsvp {
        id: row.get(0)?,
        event_id: row.get(1)?,
        member_id: row.get(2)?,
        status: status_from_column(row, 3)?,
        guests: row.get(4)?,
        source: row.get(5)?,
        tracking_token: row.get(6)?,
        checked_in_at: row.get(7)?,
        created: row.get(8)?,
    })
}

fn attendee_from_row(row: &Row) -> rusqlite::Result<Attendee> {
    Ok(Attendee {
        rsvp_id: row.get(0)?,
        event_id: row.get(1)?,
        member_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        status: status_from_column(row, 7)?,
        guests: row.get(8)?,
        checked_in_at: row.get(9)?,
        created: row.get(10)?,
    })
}

#[derive(Clone)]
pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)
            .context("Failed to open events database")?;
        Ok(SqliteEventStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(SqliteEventStore {
            conn: Arc::new(Mutex::new(open_in_memory_db(VERSIONED_SCHEMAS)?)),
        })
    }

    fn query_going(conn: &Connection, event_id: usize) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COALESCE(SUM(1 + guests), 0) FROM rsvp WHERE event_id = ?1 AND status = ?2",
            params![event_id, RsvpStatus::Going.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn query_event(conn: &Connection, event_id: usize) -> Result<Option<Event>> {
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM event WHERE id = ?1", EVENT_COLUMNS),
                params![event_id],
                event_from_row,
            )
            .optional()?)
    }
}

impl EventStore for SqliteEventStore {
    fn create_event(&self, event: &NewEvent, slug: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (slug, title, description, location_name, address, starts_at, ends_at, capacity, published) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                EVENT_TABLE_V_0.name
            ),
            params![
                slug,
                event.title,
                event.description,
                event.location_name,
                event.address,
                event.starts_at,
                event.ends_at,
                event.capacity,
                event.published,
            ],
        )?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_event(&self, event_id: usize) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        Self::query_event(&conn, event_id)
    }

    fn get_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM event WHERE slug = ?1", EVENT_COLUMNS),
                params![slug],
                event_from_row,
            )
            .optional()?)
    }

    fn is_slug_taken(&self, slug: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM event WHERE slug = ?1",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn update_event(&self, event_id: usize, patch: &EventPatch) -> Result<Option<Event>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut event = match Self::query_event(&tx, event_id)? {
            Some(event) => event,
            None => return Ok(None),
        };

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(location_name) = &patch.location_name {
            event.location_name = Some(location_name.clone());
        }
        if let Some(address) = &patch.address {
            event.address = Some(address.clone());
        }
        if let Some(starts_at) = patch.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            event.ends_at = Some(ends_at);
        }
        if let Some(capacity) = patch.capacity {
            event.capacity = Some(capacity);
        }
        if let Some(published) = patch.published {
            event.published = published;
        }

        tx.execute(
            "UPDATE event SET title = ?2, description = ?3, location_name = ?4, address = ?5, starts_at = ?6, ends_at = ?7, capacity = ?8, published = ?9 WHERE id = ?1",
            params![
                event_id,
                event.title,
                event.description,
                event.location_name,
                event.address,
                event.starts_at,
                event.ends_at,
                event.capacity,
                event.published,
            ],
        )?;
        tx.commit()?;
        Ok(Some(event))
    }

    fn delete_event(&self, event_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM event WHERE id = ?1", params![event_id])?;
        Ok(deleted > 0)
    }

    fn list_events(&self, filter: &EventListFilter) -> Result<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM event
             WHERE (?1 IS NULL OR COALESCE(ends_at, starts_at + ?2) >= ?1)
               AND (?3 OR published = 1)
             ORDER BY starts_at ASC",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map(
                params![
                    filter.upcoming_after,
                    Event::DEFAULT_DURATION_SECS,
                    filter.include_unpublished
                ],
                event_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn find_member_by_phone(&self, phone: &str) -> Result<Option<Member>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM member WHERE phone = ?1", MEMBER_COLUMNS),
                params![phone],
                member_from_row,
            )
            .optional()?)
    }

    fn get_member(&self, member_id: usize) -> Result<Option<Member>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM member WHERE id = ?1", MEMBER_COLUMNS),
                params![member_id],
                member_from_row,
            )
            .optional()?)
    }

    fn create_member(&self, member: &NewMember) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO member (first_name, last_name, email, phone, zip) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                member.first_name,
                member.last_name,
                member.email,
                member.phone,
                member.zip
            ],
        )
        .with_context(|| format!("Failed to create member with phone {}", member.phone))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn update_member_contact(
        &self,
        member_id: usize,
        email: Option<&str>,
        zip: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE member SET email = COALESCE(email, ?2), zip = COALESCE(zip, ?3) WHERE id = ?1",
            params![member_id, email, zip],
        )?;
        Ok(())
    }

    fn get_rsvp(&self, rsvp_id: usize) -> Result<Option<Rsvp>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM rsvp WHERE id = ?1", RSVP_COLUMNS),
                params![rsvp_id],
                rsvp_from_row,
            )
            .optional()?)
    }

    fn find_rsvp(&self, event_id: usize, member_id: usize) -> Result<Option<Rsvp>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM rsvp WHERE event_id = ?1 AND member_id = ?2",
                    RSVP_COLUMNS
                ),
                params![event_id, member_id],
                rsvp_from_row,
            )
            .optional()?)
    }

    fn reserve_rsvp(&self, rsvp: &NewRsvp, capacity: Option<u32>) -> Result<RsvpReservation> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM rsvp WHERE event_id = ?1 AND member_id = ?2",
                    RSVP_COLUMNS
                ),
                params![rsvp.event_id, rsvp.member_id],
                rsvp_from_row,
            )
            .optional()?;
        if let Some(existing) = &existing {
            if existing.status == RsvpStatus::Going {
                return Ok(RsvpReservation::AlreadyGoing(existing.clone()));
            }
        }

        if let Some(capacity) = capacity {
            let going = Self::query_going(&tx, rsvp.event_id)?;
            if going + 1 + rsvp.guests as usize > capacity as usize {
                return Ok(RsvpReservation::Full { going });
            }
        }

        let reservation = match existing {
            Some(cancelled) => {
                tx.execute(
                    "UPDATE rsvp SET status = ?2, guests = ?3, source = ?4, tracking_token = ?5, checked_in_at = NULL WHERE id = ?1",
                    params![
                        cancelled.id,
                        RsvpStatus::Going.as_str(),
                        rsvp.guests,
                        rsvp.source,
                        rsvp.tracking_token
                    ],
                )?;
                RsvpReservation::Reactivated(cancelled.id)
            }
            None => {
                tx.execute(
                    "INSERT INTO rsvp (event_id, member_id, status, guests, source, tracking_token) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        rsvp.event_id,
                        rsvp.member_id,
                        RsvpStatus::Going.as_str(),
                        rsvp.guests,
                        rsvp.source,
                        rsvp.tracking_token
                    ],
                )?;
                RsvpReservation::Created(tx.last_insert_rowid() as usize)
            }
        };
        tx.commit()?;
        debug!(
            "Reserved rsvp for member {} to event {}: {:?}",
            rsvp.member_id, rsvp.event_id, reservation
        );
        Ok(reservation)
    }

    fn set_rsvp_status(&self, rsvp_id: usize, status: RsvpStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE rsvp SET status = ?2 WHERE id = ?1",
            params![rsvp_id, status.as_str()],
        )?;
        Ok(())
    }

    fn count_going(&self, event_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Self::query_going(&conn, event_id)
    }

    fn list_attendees(&self, event_id: usize) -> Result<Vec<Attendee>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.event_id = ?1 ORDER BY m.last_name COLLATE NOCASE, m.first_name COLLATE NOCASE",
            ATTENDEE_SELECT
        ))?;
        let attendees = stmt
            .query_map(params![event_id], attendee_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attendees)
    }

    fn get_attendee(&self, rsvp_id: usize) -> Result<Option<Attendee>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("{} WHERE r.id = ?1", ATTENDEE_SELECT),
                params![rsvp_id],
                attendee_from_row,
            )
            .optional()?)
    }

    fn event_stats(&self, event_id: usize) -> Result<EventStats> {
        let conn = self.conn.lock().unwrap();
        let going = RsvpStatus::Going.as_str();
        let stats = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ?2 AND checked_in_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ?2 THEN guests ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status != ?2 THEN 1 ELSE 0 END), 0)
             FROM rsvp WHERE event_id = ?1",
            params![event_id, going],
            |row| {
                Ok(EventStats {
                    rsvp_count: row.get::<_, i64>(0)? as usize,
                    checked_in_count: row.get::<_, i64>(1)? as usize,
                    guests_count: row.get::<_, i64>(2)? as usize,
                    cancelled_count: row.get::<_, i64>(3)? as usize,
                })
            },
        )?;
        Ok(stats)
    }

    fn mark_checked_in(&self, rsvp_id: usize, at: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE rsvp SET checked_in_at = ?2 WHERE id = ?1 AND checked_in_at IS NULL",
            params![rsvp_id, at],
        )?;
        Ok(updated == 1)
    }

    fn insert_subscriber(&self, subscriber: &NewSubscriber) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subscriber (email, first_name, zip, source) VALUES (?1, ?2, ?3, ?4)",
            params![
                subscriber.email,
                subscriber.first_name,
                subscriber.zip,
                subscriber.source
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid() as usize))
    }

    fn list_subscribers(&self, limit: usize, offset: usize) -> Result<Vec<Subscriber>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, email, first_name, zip, source, created FROM subscriber ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let subscribers = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok(Subscriber {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    first_name: row.get(2)?,
                    zip: row.get(3)?,
                    source: row.get(4)?,
                    created: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subscribers)
    }

    fn count_subscribers(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM subscriber", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    fn new_event(title: &str, starts_at: i64) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            slug: None,
            description: "desc".to_string(),
            location_name: Some("Union Hall".to_string()),
            address: None,
            starts_at,
            ends_at: None,
            capacity: None,
            published: true,
        }
    }

    fn new_member(phone: &str) -> NewMember {
        NewMember {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: phone.to_string(),
            zip: None,
        }
    }

    fn reserve(store: &SqliteEventStore, event_id: usize, member_id: usize) -> usize {
        let rsvp = NewRsvp {
            event_id,
            member_id,
            guests: 0,
            source: None,
            tracking_token: None,
        };
        match store.reserve_rsvp(&rsvp, None).unwrap() {
            RsvpReservation::Created(id) => id,
            other => panic!("Unexpected reservation {:?}", other),
        }
    }

    #[test]
    fn creates_and_reads_events() {
        let store = SqliteEventStore::in_memory().unwrap();
        let id = store
            .create_event(&new_event("Town Hall", 1_000), "town-hall")
            .unwrap();

        let event = store.get_event(id).unwrap().unwrap();
        assert_eq!(event.slug, "town-hall");
        assert!(event.published);
        assert_eq!(store.get_event_by_slug("town-hall").unwrap(), Some(event));
        assert!(store.is_slug_taken("town-hall").unwrap());
        assert!(!store.is_slug_taken("other").unwrap());

        assert!(store
            .create_event(&new_event("Dup", 2_000), "town-hall")
            .is_err());
    }

    #[test]
    fn lists_upcoming_published_events_in_order() {
        let store = SqliteEventStore::in_memory().unwrap();
        store.create_event(&new_event("Later", 50_000), "later").unwrap();
        store.create_event(&new_event("Past", 100), "past").unwrap();
        store.create_event(&new_event("Soon", 20_000), "soon").unwrap();
        let mut draft = new_event("Draft", 30_000);
        draft.published = false;
        store.create_event(&draft, "draft").unwrap();

        let filter = EventListFilter {
            upcoming_after: Some(15_000),
            include_unpublished: false,
        };
        let slugs: Vec<String> = store
            .list_events(&filter)
            .unwrap()
            .into_iter()
            .map(|e| e.slug)
            .collect();
        assert_eq!(slugs, vec!["soon", "later"]);

        let all = store
            .list_events(&EventListFilter {
                upcoming_after: None,
                include_unpublished: true,
            })
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].slug, "past");
    }

    #[test]
    fn updates_only_patched_fields() {
        let store = SqliteEventStore::in_memory().unwrap();
        let id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();

        let updated = store
            .update_event(
                id,
                &EventPatch {
                    capacity: Some(40),
                    published: Some(false),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.capacity, Some(40));
        assert!(!updated.published);
        assert_eq!(updated.title, "Town Hall");
        assert_eq!(store.get_event(id).unwrap().unwrap(), updated);

        assert!(store.update_event(999, &EventPatch::default()).unwrap().is_none());
    }

    #[test]
    fn rsvp_is_unique_per_member_and_event() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event_id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();
        let member_id = store.create_member(&new_member("5551234567")).unwrap();

        let rsvp = NewRsvp {
            event_id,
            member_id,
            guests: 2,
            source: Some("web".to_string()),
            tracking_token: None,
        };
        let rsvp_id = match store.reserve_rsvp(&rsvp, None).unwrap() {
            RsvpReservation::Created(id) => id,
            other => panic!("Unexpected reservation {:?}", other),
        };
        match store.reserve_rsvp(&rsvp, None).unwrap() {
            RsvpReservation::AlreadyGoing(existing) => assert_eq!(existing.id, rsvp_id),
            other => panic!("Unexpected reservation {:?}", other),
        }

        let found = store.find_rsvp(event_id, member_id).unwrap().unwrap();
        assert_eq!(found.id, rsvp_id);
        assert_eq!(found.status, RsvpStatus::Going);
        assert_eq!(store.count_going(event_id).unwrap(), 3);
    }

    #[test]
    fn reservation_respects_capacity() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event_id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();
        let first = store.create_member(&new_member("5551234567")).unwrap();
        let second = store.create_member(&new_member("5559876543")).unwrap();

        let party = |member_id, guests| NewRsvp {
            event_id,
            member_id,
            guests,
            source: None,
            tracking_token: None,
        };
        assert!(matches!(
            store.reserve_rsvp(&party(first, 1), Some(3)).unwrap(),
            RsvpReservation::Created(_)
        ));
        assert_eq!(
            store.reserve_rsvp(&party(second, 1), Some(3)).unwrap(),
            RsvpReservation::Full { going: 2 }
        );
        assert!(store.find_rsvp(event_id, second).unwrap().is_none());
        assert!(matches!(
            store.reserve_rsvp(&party(second, 0), Some(3)).unwrap(),
            RsvpReservation::Created(_)
        ));
        assert_eq!(store.count_going(event_id).unwrap(), 3);
    }

    #[test]
    fn reactivation_starts_a_fresh_registration() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event_id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();
        let member_id = store.create_member(&new_member("5551234567")).unwrap();
        let rsvp_id = match store
            .reserve_rsvp(
                &NewRsvp {
                    event_id,
                    member_id,
                    guests: 2,
                    source: Some("web".to_string()),
                    tracking_token: Some("flyer2026".to_string()),
                },
                None,
            )
            .unwrap()
        {
            RsvpReservation::Created(id) => id,
            other => panic!("Unexpected reservation {:?}", other),
        };
        assert!(store.mark_checked_in(rsvp_id, 1_500).unwrap());
        store.set_rsvp_status(rsvp_id, RsvpStatus::Cancelled).unwrap();

        let again = NewRsvp {
            event_id,
            member_id,
            guests: 0,
            source: Some("sms".to_string()),
            tracking_token: None,
        };
        assert_eq!(
            store.reserve_rsvp(&again, None).unwrap(),
            RsvpReservation::Reactivated(rsvp_id)
        );
        let rsvp = store.get_rsvp(rsvp_id).unwrap().unwrap();
        assert_eq!(rsvp.status, RsvpStatus::Going);
        assert_eq!(rsvp.guests, 0);
        assert_eq!(rsvp.checked_in_at, None);
        assert_eq!(rsvp.source.as_deref(), Some("sms"));
        assert_eq!(rsvp.tracking_token, None);
    }

    #[test]
    fn member_phone_is_unique_and_contact_is_only_filled() {
        let store = SqliteEventStore::in_memory().unwrap();
        let id = store.create_member(&new_member("5551234567")).unwrap();
        assert!(store.create_member(&new_member("5551234567")).is_err());

        store
            .update_member_contact(id, Some("ada@example.org"), None)
            .unwrap();
        store
            .update_member_contact(id, Some("other@example.org"), Some("02139"))
            .unwrap();

        let member = store.find_member_by_phone("5551234567").unwrap().unwrap();
        assert_eq!(member.email.as_deref(), Some("ada@example.org"));
        assert_eq!(member.zip.as_deref(), Some("02139"));
    }

    #[test]
    fn check_in_only_happens_once() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event_id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();
        let member_id = store.create_member(&new_member("5551234567")).unwrap();
        let rsvp_id = reserve(&store, event_id, member_id);

        assert!(store.mark_checked_in(rsvp_id, 1_500).unwrap());
        assert!(!store.mark_checked_in(rsvp_id, 1_600).unwrap());
        let attendee = store.get_attendee(rsvp_id).unwrap().unwrap();
        assert_eq!(attendee.checked_in_at, Some(1_500));

        let stats = store.event_stats(event_id).unwrap();
        assert_eq!(
            stats,
            EventStats {
                rsvp_count: 1,
                checked_in_count: 1,
                guests_count: 0,
                cancelled_count: 0,
            }
        );
    }

    #[test]
    fn deleting_event_cascades_to_rsvps() {
        let store = SqliteEventStore::in_memory().unwrap();
        let event_id = store.create_event(&new_event("Town Hall", 1_000), "town-hall").unwrap();
        let member_id = store.create_member(&new_member("5551234567")).unwrap();
        let rsvp_id = reserve(&store, event_id, member_id);

        assert!(store.delete_event(event_id).unwrap());
        assert!(!store.delete_event(event_id).unwrap());
        assert!(store.get_rsvp(rsvp_id).unwrap().is_none());
    }

    #[test]
    fn duplicate_subscriber_is_ignored() {
        let store = SqliteEventStore::in_memory().unwrap();
        let subscriber = NewSubscriber {
            email: "ada@example.org".to_string(),
            first_name: None,
            zip: None,
            source: Some("footer".to_string()),
        };
        assert!(store.insert_subscriber(&subscriber).unwrap().is_some());
        assert_eq!(store.insert_subscriber(&subscriber).unwrap(), None);
        assert_eq!(store.count_subscribers().unwrap(), 1);
        assert_eq!(store.list_subscribers(10, 0).unwrap()[0].email, "ada@example.org");
    }

    #[test]
    fn migrates_v0_to_v1() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("events.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute(
                "INSERT INTO event (slug, title, description, starts_at, published) VALUES ('a', 'A', '', 10, 1)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO member (first_name, last_name, phone) VALUES ('Ada', 'L', '5551234567')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO rsvp (event_id, member_id, status) VALUES (1, 1, 'going')",
                [],
            )
            .unwrap();
        }

        let store = SqliteEventStore::new(&db_path).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            let version: i64 = conn
                .query_row("PRAGMA user_version;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(version, BASE_DB_VERSION as i64 + 1);
        }

        let rsvp = store.get_rsvp(1).unwrap().unwrap();
        assert_eq!(rsvp.tracking_token, None);
        assert_eq!(rsvp.status, RsvpStatus::Going);

        // Re-opening an up to date database is a no-op.
        drop(store);
        SqliteEventStore::new(&db_path).unwrap();
    }
}
