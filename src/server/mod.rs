mod admin_routes;
mod analytics_routes;
mod api_error;
pub mod config;
mod event_routes;
mod http_layers;
pub mod metrics;
pub mod server;
pub(self) mod session;
pub mod state;

pub use analytics_routes::MAX_BEACON_BODY_BYTES;
pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
