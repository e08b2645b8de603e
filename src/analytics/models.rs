use serde::{Deserialize, Serialize};

pub const MAX_ID_LENGTH: usize = 64;
pub const MAX_PATH_LENGTH: usize = 2048;
pub const MAX_TEXT_LENGTH: usize = 512;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackingLink {
    pub id: usize,
    pub token: String,
    pub label: String,
    pub channel: Option<String>,
    pub destination_path: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_by: Option<usize>,
    pub created: i64,
    pub first_visit_at: Option<i64>,
    pub last_visit_at: Option<i64>,
    pub visit_count: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewTrackingLink {
    pub label: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub destination_path: Option<String>,
    /// Custom token, a random one is generated when missing.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
}

/// Body of the page view beacon sent by the frontend on every page load.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageViewBeacon {
    pub visitor_id: String,
    pub session_id: String,
    pub path: String,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub screen_width: Option<u32>,
    #[serde(default)]
    pub screen_height: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub tracking_token: Option<String>,
}

/// Sent when the visitor scrolls, hides or leaves the page.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageViewUpdate {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub max_scroll_pct: Option<i64>,
    #[serde(default)]
    pub exited: Option<bool>,
}

/// A page view as stored, after validation and user-agent enrichment.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PageView {
    pub id: usize,
    pub visitor_id: String,
    pub session_id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub title: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub tracking_token: Option<String>,
    pub tracking_link_id: Option<usize>,
    pub duration_ms: Option<u64>,
    pub max_scroll_pct: Option<u8>,
    pub exited: bool,
    pub created: i64,
}

#[derive(Clone, Debug, Default)]
pub struct NewPageView {
    pub visitor_id: String,
    pub session_id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub title: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub tracking_token: Option<String>,
    pub tracking_link_id: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormEventType {
    View,
    Start,
    Step,
    Error,
    Submit,
    Abandon,
}

impl FormEventType {
    pub const ALL: [FormEventType; 6] = [
        FormEventType::View,
        FormEventType::Start,
        FormEventType::Step,
        FormEventType::Error,
        FormEventType::Submit,
        FormEventType::Abandon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormEventType::View => "view",
            FormEventType::Start => "start",
            FormEventType::Step => "step",
            FormEventType::Error => "error",
            FormEventType::Submit => "submit",
            FormEventType::Abandon => "abandon",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FormEventBeacon {
    pub visitor_id: String,
    pub session_id: String,
    pub form_name: String,
    /// Kept as a string so unknown types can be rejected with a proper message.
    pub event_type: String,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tracking_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewFormEvent {
    pub visitor_id: String,
    pub session_id: String,
    pub form_name: String,
    pub event_type: FormEventType,
    pub step: Option<String>,
    pub field: Option<String>,
    pub error_message: Option<String>,
    pub path: Option<String>,
    pub tracking_token: Option<String>,
    pub tracking_link_id: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub page_views: usize,
    pub unique_visitors: usize,
    pub unique_sessions: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TrackingLinkStats {
    pub link_id: usize,
    pub token: String,
    pub label: String,
    pub page_views: usize,
    pub unique_visitors: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FormFunnel {
    pub form_name: String,
    /// Count per event type, in funnel order, zero-filled.
    pub steps: Vec<CountEntry>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalyticsSummary {
    pub since: i64,
    pub totals: Totals,
    pub top_paths: Vec<CountEntry>,
    pub by_utm_source: Vec<CountEntry>,
    pub by_device: Vec<CountEntry>,
    pub by_tracking_link: Vec<TrackingLinkStats>,
    pub form_funnels: Vec<FormFunnel>,
}
