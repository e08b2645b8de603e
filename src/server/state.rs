use axum::extract::FromRef;

use crate::analytics::AnalyticsManager;
use crate::events::EventManager;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedEventManager = Arc<EventManager>;
pub type GuardedAnalyticsManager = Arc<AnalyticsManager>;
pub type GuardedUserManager = Arc<UserManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub event_manager: GuardedEventManager,
    pub analytics_manager: GuardedAnalyticsManager,
    pub user_manager: GuardedUserManager,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedEventManager {
    fn from_ref(input: &ServerState) -> Self {
        input.event_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedAnalyticsManager {
    fn from_ref(input: &ServerState) -> Self {
        input.analytics_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
