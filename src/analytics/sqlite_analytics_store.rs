use super::analytics_store::AnalyticsStore;
use super::models::*;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_in_memory_db, open_versioned_db, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

/// V 0
const TRACKING_LINK_TABLE_V_0: Table = Table {
    name: "tracking_link",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("token", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("label", &SqlType::Text, non_null = true),
        sqlite_column!("channel", &SqlType::Text),
        sqlite_column!("destination_path", &SqlType::Text, non_null = true),
        sqlite_column!("utm_source", &SqlType::Text),
        sqlite_column!("utm_medium", &SqlType::Text),
        sqlite_column!("utm_campaign", &SqlType::Text),
        sqlite_column!("created_by", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("first_visit_at", &SqlType::Integer),
        sqlite_column!("last_visit_at", &SqlType::Integer),
        sqlite_column!(
            "visit_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};
const PAGE_VIEW_TABLE_V_0: Table = Table {
    name: "page_view",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("visitor_id", &SqlType::Text, non_null = true),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("path", &SqlType::Text, non_null = true),
        sqlite_column!("referrer", &SqlType::Text),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("utm_source", &SqlType::Text),
        sqlite_column!("utm_medium", &SqlType::Text),
        sqlite_column!("utm_campaign", &SqlType::Text),
        sqlite_column!("utm_term", &SqlType::Text),
        sqlite_column!("utm_content", &SqlType::Text),
        sqlite_column!("device_type", &SqlType::Text),
        sqlite_column!("browser", &SqlType::Text),
        sqlite_column!("os", &SqlType::Text),
        sqlite_column!("screen_width", &SqlType::Integer),
        sqlite_column!("screen_height", &SqlType::Integer),
        sqlite_column!("language", &SqlType::Text),
        sqlite_column!("timezone", &SqlType::Text),
        sqlite_column!("tracking_token", &SqlType::Text),
        sqlite_column!(
            "tracking_link_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "tracking_link",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("max_scroll_pct", &SqlType::Integer),
        sqlite_column!(
            "exited",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_page_view_created", "created"),
        ("idx_page_view_tracking_link_id", "tracking_link_id"),
    ],
    unique_constraints: &[],
};
const FORM_EVENT_TABLE_V_0: Table = Table {
    name: "form_event",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("visitor_id", &SqlType::Text, non_null = true),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("form_name", &SqlType::Text, non_null = true),
        sqlite_column!("event_type", &SqlType::Text, non_null = true),
        sqlite_column!("step", &SqlType::Text),
        sqlite_column!("field", &SqlType::Text),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("path", &SqlType::Text),
        sqlite_column!("tracking_token", &SqlType::Text),
        sqlite_column!(
            "tracking_link_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "tracking_link",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_form_event_created", "created")],
    unique_constraints: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        TRACKING_LINK_TABLE_V_0,
        PAGE_VIEW_TABLE_V_0,
        FORM_EVENT_TABLE_V_0,
    ],
    migration: None,
}];

const TRACKING_LINK_COLUMNS: &str = "id, token, label, channel, destination_path, utm_source, utm_medium, utm_campaign, created_by, created, first_visit_at, last_visit_at, visit_count";
const PAGE_VIEW_COLUMNS: &str = "id, visitor_id, session_id, path, referrer, title, utm_source, utm_medium, utm_campaign, utm_term, utm_content, device_type, browser, os, screen_width, screen_height, language, timezone, tracking_token, tracking_link_id, duration_ms, max_scroll_pct, exited, created";

/// Reports only count human traffic.
const NOT_BOT: &str = "COALESCE(device_type, '') != 'bot'";

fn tracking_link_from_row(row: &Row) -> rusqlite::Result<TrackingLink> {
    Ok(TrackingLink {
        id: row.get(0)?,
        token: row.get(1)?,
        label: row.get(2)?,
        channel: row.get(3)?,
        destination_path: row.get(4)?,
        utm_source: row.get(5)?,
        utm_medium: row.get(6)?,
        utm_campaign: row.get(7)?,
        created_by: row.get(8)?,
        created: row.get(9)?,
        first_visit_at: row.get(10)?,
        last_visit_at: row.get(11)?,
        visit_count: row.get::<_, i64>(12)? as usize,
    })
}

fn page_view_from_row(row: &Row) -> rusqlite::Result<PageView> {
    Ok(PageView {
        id: row.get(0)?,
        visitor_id: row.get(1)?,
        session_id: row.get(2)?,
        path: row.get(3)?,
        referrer: row.get(4)?,
        title: row.get(5)?,
        utm_source: row.get(6)?,
        utm_medium: row.get(7)?,
        utm_campaign: row.get(8)?,
        utm_term: row.get(9)?,
        utm_content: row.get(10)?,
        device_type: row.get(11)?,
        browser: row.get(12)?,
        os: row.get(13)?,
        screen_width: row.get(14)?,
        screen_height: row.get(15)?,
        language: row.get(16)?,
        timezone: row.get(17)?,
        tracking_token: row.get(18)?,
        tracking_link_id: row.get(19)?,
        duration_ms: row.get::<_, Option<i64>>(20)?.map(|d| d.max(0) as u64),
        max_scroll_pct: row.get(21)?,
        exited: row.get::<_, i64>(22)? != 0,
        created: row.get(23)?,
    })
}

fn count_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<CountEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params, |row| {
            Ok(CountEntry {
                key: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

#[derive(Clone)]
pub struct SqliteAnalyticsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAnalyticsStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)
            .context("Failed to open analytics database")?;
        Ok(SqliteAnalyticsStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(SqliteAnalyticsStore {
            conn: Arc::new(Mutex::new(open_in_memory_db(VERSIONED_SCHEMAS)?)),
        })
    }
}

impl AnalyticsStore for SqliteAnalyticsStore {
    fn create_tracking_link(
        &self,
        token: &str,
        link: &NewTrackingLink,
        destination_path: &str,
        created_by: Option<usize>,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracking_link (token, label, channel, destination_path, utm_source, utm_medium, utm_campaign, created_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                token,
                link.label,
                link.channel,
                destination_path,
                link.utm_source,
                link.utm_medium,
                link.utm_campaign,
                created_by
            ],
        )
        .with_context(|| format!("Failed to create tracking link {}", token))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_tracking_link(&self, link_id: usize) -> Result<Option<TrackingLink>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM tracking_link WHERE id = ?1",
                    TRACKING_LINK_COLUMNS
                ),
                params![link_id],
                tracking_link_from_row,
            )
            .optional()?)
    }

    fn find_tracking_link_by_token(&self, token: &str) -> Result<Option<TrackingLink>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM tracking_link WHERE token = ?1",
                    TRACKING_LINK_COLUMNS
                ),
                params![token],
                tracking_link_from_row,
            )
            .optional()?)
    }

    fn list_tracking_links(&self) -> Result<Vec<TrackingLink>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracking_link ORDER BY id DESC",
            TRACKING_LINK_COLUMNS
        ))?;
        let links = stmt
            .query_map([], tracking_link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    fn record_tracking_visit(&self, link_id: usize, at: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tracking_link SET
                first_visit_at = COALESCE(first_visit_at, ?2),
                last_visit_at = ?2,
                visit_count = visit_count + 1
             WHERE id = ?1",
            params![link_id, at],
        )?;
        Ok(())
    }

    fn insert_page_view(&self, pv: &NewPageView) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO page_view (visitor_id, session_id, path, referrer, title, utm_source, utm_medium, utm_campaign, utm_term, utm_content, device_type, browser, os, screen_width, screen_height, language, timezone, tracking_token, tracking_link_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                pv.visitor_id,
                pv.session_id,
                pv.path,
                pv.referrer,
                pv.title,
                pv.utm_source,
                pv.utm_medium,
                pv.utm_campaign,
                pv.utm_term,
                pv.utm_content,
                pv.device_type,
                pv.browser,
                pv.os,
                pv.screen_width,
                pv.screen_height,
                pv.language,
                pv.timezone,
                pv.tracking_token,
                pv.tracking_link_id,
            ],
        )?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_page_view(&self, page_view_id: usize) -> Result<Option<PageView>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM page_view WHERE id = ?1", PAGE_VIEW_COLUMNS),
                params![page_view_id],
                page_view_from_row,
            )
            .optional()?)
    }

    fn update_page_view(
        &self,
        page_view_id: usize,
        duration_ms: Option<u64>,
        max_scroll_pct: Option<u8>,
        exited: bool,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let duration_ms = duration_ms.map(|d| d.min(i64::MAX as u64) as i64);
        let updated = conn.execute(
            "UPDATE page_view SET
                duration_ms = CASE WHEN ?2 IS NULL THEN duration_ms ELSE MAX(COALESCE(duration_ms, 0), ?2) END,
                max_scroll_pct = CASE WHEN ?3 IS NULL THEN max_scroll_pct ELSE MAX(COALESCE(max_scroll_pct, 0), ?3) END,
                exited = MAX(exited, ?4)
             WHERE id = ?1",
            params![page_view_id, duration_ms, max_scroll_pct, exited],
        )?;
        Ok(updated == 1)
    }

    fn insert_form_event(&self, event: &NewFormEvent) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO form_event (visitor_id, session_id, form_name, event_type, step, field, error_message, path, tracking_token, tracking_link_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.visitor_id,
                event.session_id,
                event.form_name,
                event.event_type.as_str(),
                event.step,
                event.field,
                event.error_message,
                event.path,
                event.tracking_token,
                event.tracking_link_id,
            ],
        )?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn totals(&self, since: i64) -> Result<Totals> {
        let conn = self.conn.lock().unwrap();
        let totals = conn.query_row(
            &format!(
                "SELECT COUNT(*), COUNT(DISTINCT visitor_id), COUNT(DISTINCT session_id)
                 FROM page_view WHERE created >= ?1 AND {}",
                NOT_BOT
            ),
            params![since],
            |row| {
                Ok(Totals {
                    page_views: row.get::<_, i64>(0)? as usize,
                    unique_visitors: row.get::<_, i64>(1)? as usize,
                    unique_sessions: row.get::<_, i64>(2)? as usize,
                })
            },
        )?;
        Ok(totals)
    }

    fn top_paths(&self, since: i64, limit: usize) -> Result<Vec<CountEntry>> {
        let conn = self.conn.lock().unwrap();
        count_entries(
            &conn,
            &format!(
                "SELECT path, COUNT(*) AS views FROM page_view
                 WHERE created >= ?1 AND {}
                 GROUP BY path ORDER BY views DESC, path ASC LIMIT ?2",
                NOT_BOT
            ),
            params![since, limit as i64],
        )
    }

    fn count_by_utm_source(&self, since: i64) -> Result<Vec<CountEntry>> {
        let conn = self.conn.lock().unwrap();
        count_entries(
            &conn,
            &format!(
                "SELECT COALESCE(NULLIF(utm_source, ''), '(direct)') AS source, COUNT(*) AS views
                 FROM page_view WHERE created >= ?1 AND {}
                 GROUP BY source ORDER BY views DESC, source ASC",
                NOT_BOT
            ),
            params![since],
        )
    }

    fn count_by_device(&self, since: i64) -> Result<Vec<CountEntry>> {
        let conn = self.conn.lock().unwrap();
        count_entries(
            &conn,
            "SELECT COALESCE(device_type, 'unknown') AS device, COUNT(*) AS views
             FROM page_view WHERE created >= ?1
             GROUP BY device ORDER BY views DESC, device ASC",
            params![since],
        )
    }

    fn tracking_link_stats(&self, since: i64) -> Result<Vec<TrackingLinkStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT l.id, l.token, l.label, COUNT(p.id) AS views, COUNT(DISTINCT p.visitor_id)
             FROM tracking_link l
             LEFT JOIN page_view p ON p.tracking_link_id = l.id AND p.created >= ?1 AND {}
             GROUP BY l.id ORDER BY views DESC, l.id ASC",
            NOT_BOT.replace("device_type", "p.device_type")
        ))?;
        let stats = stmt
            .query_map(params![since], |row| {
                Ok(TrackingLinkStats {
                    link_id: row.get(0)?,
                    token: row.get(1)?,
                    label: row.get(2)?,
                    page_views: row.get::<_, i64>(3)? as usize,
                    unique_visitors: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn form_event_counts(&self, since: i64) -> Result<Vec<(String, FormEventType, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT form_name, event_type, COUNT(*) FROM form_event
             WHERE created >= ?1
             GROUP BY form_name, event_type ORDER BY form_name ASC",
        )?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? as usize,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = Vec::with_capacity(rows.len());
        for (form_name, event_type, count) in rows {
            match FormEventType::from_str(&event_type) {
                Some(event_type) => counts.push((form_name, event_type, count)),
                None => warn!("Skipping unknown form event type {}", event_type),
            }
        }
        Ok(counts)
    }

    fn prune_before(&self, before: i64) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let page_views = tx.execute("DELETE FROM page_view WHERE created < ?1", params![before])?;
        let form_events =
            tx.execute("DELETE FROM form_event WHERE created < ?1", params![before])?;
        tx.commit()?;
        debug!(
            "Pruned {} page views and {} form events",
            page_views, form_events
        );
        Ok(page_views + form_events)
    }
}
