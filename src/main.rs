use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rally_server::analytics::{AnalyticsManager, SqliteAnalyticsStore};
use rally_server::config::{AppConfig, CliConfig, FileConfig};
use rally_server::events::{EventManager, SqliteEventStore};
use rally_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use rally_server::user::{SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file, its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding events.db, analytics.db and user.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Cache max-age in seconds of the public event listings.
    #[clap(long, default_value_t = 60)]
    pub content_cache_age_sec: usize,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Days of page views and form events to keep. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 365)]
    pub analytics_retention_days: u64,

    /// Days a session token may stay unused before it is deleted. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub token_retention_days: u64,

    /// Interval in hours between pruning runs.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            content_cache_age_sec: args.content_cache_age_sec,
            frontend_dir_path: args.frontend_dir_path.clone(),
            analytics_retention_days: args.analytics_retention_days,
            token_retention_days: args.token_retention_days,
            prune_interval_hours: args.prune_interval_hours,
        }
    }
}

fn spawn_analytics_pruning(
    analytics_manager: Arc<AnalyticsManager>,
    retention_days: u64,
    interval_hours: u64,
) {
    info!(
        "Analytics pruning enabled: retaining {} days, pruning every {} hours",
        retention_days, interval_hours
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 60 * 60));
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match analytics_manager.prune_older_than(retention_days) {
                Ok(count) => {
                    metrics::record_analytics_pruned(count);
                    if count > 0 {
                        info!("Pruned {} old analytics rows", count);
                    }
                }
                Err(e) => error!("Failed to prune analytics: {}", e),
            }
        }
    });
}

fn spawn_token_pruning(user_manager: Arc<UserManager>, retention_days: u64, interval_hours: u64) {
    info!(
        "Session token pruning enabled: unused for {} days, pruning every {} hours",
        retention_days, interval_hours
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 60 * 60));
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match user_manager.prune_unused_auth_tokens(retention_days) {
                Ok(count) if count > 0 => info!("Pruned {} unused session tokens", count),
                Ok(_) => {}
                Err(e) => error!("Failed to prune session tokens: {}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match cli_args.config.as_ref() {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Opening event database at {:?}...", config.events_db_path());
    let event_store = Arc::new(SqliteEventStore::new(config.events_db_path())?);
    info!(
        "Opening analytics database at {:?}...",
        config.analytics_db_path()
    );
    let analytics_store = Arc::new(SqliteAnalyticsStore::new(config.analytics_db_path())?);
    info!("Opening user database at {:?}...", config.user_db_path());
    let user_store = SqliteUserStore::new(config.user_db_path())?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        content_cache_age_sec: config.content_cache_age_sec,
        frontend_dir_path: config.frontend_dir_path.clone(),
        analytics_summary_days: config.analytics.summary_days,
    };
    let state = ServerState::new(
        server_config,
        EventManager::new(event_store),
        AnalyticsManager::new(analytics_store),
        UserManager::new(Box::new(user_store)),
    );

    if config.analytics.retention_days > 0 {
        spawn_analytics_pruning(
            state.analytics_manager.clone(),
            config.analytics.retention_days,
            config.prune_interval_hours,
        );
    }
    if config.token_retention_days > 0 {
        spawn_token_pruning(
            state.user_manager.clone(),
            config.token_retention_days,
            config.prune_interval_hours,
        );
    }

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(state).await
}
