//! Rally Server Library
//!
//! Exposes the event, analytics and staff account modules to the binaries and
//! to the end-to-end tests.

pub mod analytics;
pub mod config;
pub mod events;
pub mod server;
pub mod sqlite_persistence;
pub mod user;
pub mod validation;

pub use analytics::{AnalyticsManager, SqliteAnalyticsStore};
pub use events::{EventManager, SqliteEventStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
pub use user::{SqliteUserStore, UserManager, UserRole, UserStore};
