mod analytics_manager;
mod analytics_store;
mod models;
mod sqlite_analytics_store;
mod tracking;
mod user_agent;

pub use analytics_manager::{AnalyticsError, AnalyticsManager};
pub use analytics_store::AnalyticsStore;
pub use models::*;
pub use sqlite_analytics_store::SqliteAnalyticsStore;
pub use tracking::{append_query_params, TrackingToken};
pub use user_agent::{parse_user_agent, DeviceType, UserAgentInfo};
