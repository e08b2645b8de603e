//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own databases.

use super::constants::*;
use super::fixtures::{create_staff_users, seed_events};
use rally_server::analytics::{AnalyticsManager, SqliteAnalyticsStore};
use rally_server::events::{Event, EventManager, SqliteEventStore};
use rally_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use rally_server::user::{SqliteUserStore, UserManager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Shared state, for direct access to the managers in tests
    pub state: ServerState,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates temporary event, analytics and user databases
    /// 2. Seeds staff accounts and events
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if any of the above fails.
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");

        let event_store = Arc::new(
            SqliteEventStore::new(temp_db_dir.path().join("events.db"))
                .expect("Failed to open event store"),
        );
        let analytics_store = Arc::new(
            SqliteAnalyticsStore::new(temp_db_dir.path().join("analytics.db"))
                .expect("Failed to open analytics store"),
        );
        let user_store = SqliteUserStore::new(temp_db_dir.path().join("user.db"))
            .expect("Failed to open user store");

        let event_manager = EventManager::new(event_store);
        let user_manager = UserManager::new(Box::new(user_store));
        seed_events(&event_manager).expect("Failed to seed events");
        create_staff_users(&user_manager).expect("Failed to create staff users");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            content_cache_age_sec: 0,
            ..Default::default()
        };
        let state = ServerState::new(
            config,
            event_manager,
            AnalyticsManager::new(analytics_store),
            user_manager,
        );
        let app = make_app(state.clone());

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Looks up a seeded event by slug, drafts included.
    pub fn event(&self, slug: &str) -> Event {
        self.state
            .event_manager
            .list_all_events()
            .expect("Failed to list events")
            .into_iter()
            .find(|event| event.slug == slug)
            .unwrap_or_else(|| panic!("No event with slug {}", slug))
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
