use super::analytics_store::AnalyticsStore;
use super::models::*;
use super::tracking::{append_query_params, TrackingToken};
use super::user_agent::{parse_user_agent, DeviceType};
use crate::validation::parse_event_slug;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const TOP_PATHS_LIMIT: usize = 10;
const MAX_TOKEN_GENERATION_ATTEMPTS: usize = 5;
const SECS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Unknown form event type {0}")]
    UnknownEventType(String),

    #[error("Not found")]
    NotFound,

    #[error("Tracking token already in use")]
    TokenTaken,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn invalid(field: &'static str, reason: &'static str) -> AnalyticsError {
    AnalyticsError::Invalid { field, reason }
}

fn validate_id(field: &'static str, raw: &str) -> Result<String, AnalyticsError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(invalid(field, "is required"));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(invalid(field, "is too long"));
    }
    Ok(id.to_string())
}

fn validate_path(raw: &str) -> Result<String, AnalyticsError> {
    let path = raw.trim();
    if !path.starts_with('/') {
        return Err(invalid("path", "must start with /"));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(invalid("path", "is too long"));
    }
    Ok(path.to_string())
}

/// Blank values become None, long ones are cut.
fn clean(value: &Option<String>, max_chars: usize) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(max_chars).collect())
}

/// Local paths only, a bare event slug expands to its page.
fn resolve_destination(raw: Option<&str>) -> Result<String, AnalyticsError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok("/".to_string()),
        Some(raw) => raw,
    };
    if raw.starts_with('/') {
        if raw.starts_with("//") || raw.contains('\\') {
            return Err(invalid("destination_path", "must be a local path"));
        }
        if raw.len() > MAX_PATH_LENGTH {
            return Err(invalid("destination_path", "is too long"));
        }
        return Ok(raw.to_string());
    }
    match parse_event_slug(raw) {
        Some(slug) => Ok(format!("/events/{}", slug)),
        None => Err(invalid("destination_path", "must be a local path")),
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct AnalyticsManager {
    store: Arc<dyn AnalyticsStore>,
}

impl AnalyticsManager {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Looks up the link a token refers to. Visits from humans are also
    /// counted on the link.
    fn attribute(
        &self,
        token: Option<&TrackingToken>,
        count_visit: bool,
    ) -> Result<Option<TrackingLink>> {
        let token = match token {
            Some(token) => token,
            None => return Ok(None),
        };
        let link = match self.store.find_tracking_link_by_token(token.as_str())? {
            Some(link) => link,
            None => {
                debug!("Unknown tracking token {}", token);
                return Ok(None);
            }
        };
        if count_visit {
            self.store.record_tracking_visit(link.id, now())?;
        }
        Ok(Some(link))
    }

    pub fn record_page_view(
        &self,
        beacon: &PageViewBeacon,
        user_agent: Option<&str>,
    ) -> Result<usize, AnalyticsError> {
        let visitor_id = validate_id("visitor_id", &beacon.visitor_id)?;
        let session_id = validate_id("session_id", &beacon.session_id)?;
        let path = validate_path(&beacon.path)?;

        let mut device_type = clean(&beacon.device_type, 32);
        let mut browser = clean(&beacon.browser, 64);
        let mut os = clean(&beacon.os, 64);
        if let Some(ua) = user_agent {
            let info = parse_user_agent(ua);
            if info.is_bot {
                device_type = Some(DeviceType::Bot.as_str().to_string());
            } else if device_type.is_none() && info.device_type != DeviceType::Unknown {
                device_type = Some(info.device_type.as_str().to_string());
            }
            browser = browser.or(Some(info.browser).filter(|b| b != "Unknown"));
            os = os.or(Some(info.os).filter(|o| o != "Unknown"));
        }

        let raw_token = clean(&beacon.tracking_token, MAX_ID_LENGTH);
        let is_bot = device_type.as_deref() == Some(DeviceType::Bot.as_str());
        let link = self.attribute(
            raw_token.as_deref().and_then(TrackingToken::parse).as_ref(),
            !is_bot,
        )?;

        let mut page_view = NewPageView {
            visitor_id,
            session_id,
            path,
            referrer: clean(&beacon.referrer, MAX_PATH_LENGTH),
            title: clean(&beacon.title, MAX_TEXT_LENGTH),
            utm_source: clean(&beacon.utm_source, MAX_TEXT_LENGTH),
            utm_medium: clean(&beacon.utm_medium, MAX_TEXT_LENGTH),
            utm_campaign: clean(&beacon.utm_campaign, MAX_TEXT_LENGTH),
            utm_term: clean(&beacon.utm_term, MAX_TEXT_LENGTH),
            utm_content: clean(&beacon.utm_content, MAX_TEXT_LENGTH),
            device_type,
            browser,
            os,
            screen_width: beacon.screen_width,
            screen_height: beacon.screen_height,
            language: clean(&beacon.language, 32),
            timezone: clean(&beacon.timezone, 64),
            tracking_token: raw_token,
            tracking_link_id: None,
        };
        if let Some(link) = link {
            page_view.tracking_link_id = Some(link.id);
            if page_view.utm_source.is_none() {
                page_view.utm_source = link.utm_source;
                page_view.utm_medium = page_view.utm_medium.or(link.utm_medium);
                page_view.utm_campaign = page_view.utm_campaign.or(link.utm_campaign);
            }
        }

        Ok(self.store.insert_page_view(&page_view)?)
    }

    pub fn update_page_view(
        &self,
        page_view_id: usize,
        update: &PageViewUpdate,
    ) -> Result<(), AnalyticsError> {
        let scroll = update.max_scroll_pct.map(|pct| pct.clamp(0, 100) as u8);
        let updated = self.store.update_page_view(
            page_view_id,
            update.duration_ms,
            scroll,
            update.exited.unwrap_or(false),
        )?;
        if updated {
            Ok(())
        } else {
            Err(AnalyticsError::NotFound)
        }
    }

    pub fn record_form_event(&self, beacon: &FormEventBeacon) -> Result<usize, AnalyticsError> {
        let event_type = FormEventType::from_str(beacon.event_type.trim())
            .ok_or_else(|| AnalyticsError::UnknownEventType(beacon.event_type.clone()))?;
        let form_name = validate_id("form_name", &beacon.form_name)?;
        let path = match beacon.path.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(path) => Some(validate_path(path)?),
        };
        let tracking_token = clean(&beacon.tracking_token, MAX_ID_LENGTH);
        let tracking_link_id = match tracking_token.as_deref().and_then(TrackingToken::parse) {
            Some(token) => self
                .store
                .find_tracking_link_by_token(token.as_str())?
                .map(|link| link.id),
            None => None,
        };

        let event = NewFormEvent {
            visitor_id: validate_id("visitor_id", &beacon.visitor_id)?,
            session_id: validate_id("session_id", &beacon.session_id)?,
            form_name,
            event_type,
            step: clean(&beacon.step, MAX_ID_LENGTH),
            field: clean(&beacon.field, MAX_ID_LENGTH),
            error_message: clean(&beacon.error_message, MAX_TEXT_LENGTH),
            path,
            tracking_token,
            tracking_link_id,
        };
        Ok(self.store.insert_form_event(&event)?)
    }

    pub fn create_tracking_link(
        &self,
        link: &NewTrackingLink,
        created_by: Option<usize>,
    ) -> Result<TrackingLink, AnalyticsError> {
        if link.label.trim().is_empty() {
            return Err(invalid("label", "is required"));
        }
        let destination = resolve_destination(link.destination_path.as_deref())?;

        let token = match link.token.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => {
                let token =
                    TrackingToken::parse(custom).ok_or_else(|| invalid("token", "is malformed"))?;
                if self.store.find_tracking_link_by_token(token.as_str())?.is_some() {
                    return Err(AnalyticsError::TokenTaken);
                }
                token
            }
            _ => self.generate_unused_token()?,
        };

        let mut cleaned = link.clone();
        cleaned.label = link.label.trim().to_string();
        cleaned.channel = clean(&link.channel, MAX_ID_LENGTH);
        cleaned.utm_source = clean(&link.utm_source, MAX_TEXT_LENGTH);
        cleaned.utm_medium = clean(&link.utm_medium, MAX_TEXT_LENGTH);
        cleaned.utm_campaign = clean(&link.utm_campaign, MAX_TEXT_LENGTH);

        let id =
            self.store
                .create_tracking_link(token.as_str(), &cleaned, &destination, created_by)?;
        info!("Created tracking link {} ({})", id, token);
        self.store
            .get_tracking_link(id)?
            .ok_or(AnalyticsError::NotFound)
    }

    fn generate_unused_token(&self) -> Result<TrackingToken, AnalyticsError> {
        for _ in 0..MAX_TOKEN_GENERATION_ATTEMPTS {
            let token = TrackingToken::generate();
            if self.store.find_tracking_link_by_token(token.as_str())?.is_none() {
                return Ok(token);
            }
        }
        Err(AnalyticsError::TokenTaken)
    }

    pub fn list_tracking_links(&self) -> Result<Vec<TrackingLink>> {
        self.store.list_tracking_links()
    }

    /// Where `/t/{token}` should send the visitor. The token rides along as
    /// `t` so the page view beacon can attribute the visit.
    pub fn redirect_location(&self, raw_token: &str) -> Result<String> {
        let token = match TrackingToken::parse(raw_token) {
            Some(token) => token,
            None => return Ok("/".to_string()),
        };
        let link = match self.store.find_tracking_link_by_token(token.as_str())? {
            Some(link) => link,
            None => return Ok("/".to_string()),
        };
        Ok(append_query_params(
            &link.destination_path,
            &[
                ("t", Some(token.as_str())),
                ("utm_source", link.utm_source.as_deref()),
                ("utm_medium", link.utm_medium.as_deref()),
                ("utm_campaign", link.utm_campaign.as_deref()),
            ],
        ))
    }

    pub fn summary(&self, since: i64) -> Result<AnalyticsSummary> {
        let mut funnels: BTreeMap<String, BTreeMap<FormEventType, usize>> = BTreeMap::new();
        for (form_name, event_type, count) in self.store.form_event_counts(since)? {
            *funnels
                .entry(form_name)
                .or_default()
                .entry(event_type)
                .or_default() += count;
        }
        let form_funnels = funnels
            .into_iter()
            .map(|(form_name, counts)| FormFunnel {
                form_name,
                steps: FormEventType::ALL
                    .iter()
                    .map(|event_type| CountEntry {
                        key: event_type.as_str().to_string(),
                        count: counts.get(event_type).copied().unwrap_or(0),
                    })
                    .collect(),
            })
            .collect();

        Ok(AnalyticsSummary {
            since,
            totals: self.store.totals(since)?,
            top_paths: self.store.top_paths(since, TOP_PATHS_LIMIT)?,
            by_utm_source: self.store.count_by_utm_source(since)?,
            by_device: self.store.count_by_device(since)?,
            by_tracking_link: self.store.tracking_link_stats(since)?,
            form_funnels,
        })
    }

    /// Summary over the last `days` days.
    pub fn summary_for_days(&self, days: u32) -> Result<AnalyticsSummary> {
        self.summary(now() - days as i64 * SECS_PER_DAY)
    }

    pub fn prune_older_than(&self, retention_days: u64) -> Result<usize> {
        let cutoff = now() - retention_days as i64 * SECS_PER_DAY;
        self.store.prune_before(cutoff)
    }
}
