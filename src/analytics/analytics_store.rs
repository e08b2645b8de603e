use super::models::*;
use anyhow::Result;

pub trait AnalyticsStore: Send + Sync {
    /// Inserts a tracking link with an already validated, unique token.
    fn create_tracking_link(
        &self,
        token: &str,
        link: &NewTrackingLink,
        destination_path: &str,
        created_by: Option<usize>,
    ) -> Result<usize>;

    fn get_tracking_link(&self, link_id: usize) -> Result<Option<TrackingLink>>;

    fn find_tracking_link_by_token(&self, token: &str) -> Result<Option<TrackingLink>>;

    /// Most recently created first.
    fn list_tracking_links(&self) -> Result<Vec<TrackingLink>>;

    /// Sets `first_visit_at` if unset, `last_visit_at` and bumps the visit
    /// counter, atomically.
    fn record_tracking_visit(&self, link_id: usize, at: i64) -> Result<()>;

    fn insert_page_view(&self, page_view: &NewPageView) -> Result<usize>;

    fn get_page_view(&self, page_view_id: usize) -> Result<Option<PageView>>;

    /// Duration and scroll depth only ever grow, `exited` only goes from
    /// false to true. Returns false if the page view does not exist.
    fn update_page_view(
        &self,
        page_view_id: usize,
        duration_ms: Option<u64>,
        max_scroll_pct: Option<u8>,
        exited: bool,
    ) -> Result<bool>;

    fn insert_form_event(&self, event: &NewFormEvent) -> Result<usize>;

    fn totals(&self, since: i64) -> Result<Totals>;

    fn top_paths(&self, since: i64, limit: usize) -> Result<Vec<CountEntry>>;

    /// Page views without a source are reported under `(direct)`.
    fn count_by_utm_source(&self, since: i64) -> Result<Vec<CountEntry>>;

    fn count_by_device(&self, since: i64) -> Result<Vec<CountEntry>>;

    fn tracking_link_stats(&self, since: i64) -> Result<Vec<TrackingLinkStats>>;

    /// Raw (form_name, event_type, count) triples.
    fn form_event_counts(&self, since: i64) -> Result<Vec<(String, FormEventType, usize)>>;

    /// Deletes page views and form events created before `before`.
    /// Returns the number of deleted rows.
    fn prune_before(&self, before: i64) -> Result<usize>;
}
