//! Contract Desk
//!
//! Headless console for the teacher-contract HR backend:
//! - Restores the persisted session or signs in with configured credentials
//! - Loads the approval board and logs one line per subject
//! - Keeps the unread badge, notification list and idle timeout running in
//!   the background until interrupted

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use client::{ClientConfig, Desk, GuardDecision};
use desk_core::{limits, LoginPayload};
use telemetry::{init_tracing_from_env, log_snapshot};
use worker::{NotificationFeed, WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    client: ClientConfig,

    /// Login used when no persisted session can be restored
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,

    /// Page opened after sign-in
    #[serde(default = "default_start_path")]
    start_path: String,

    #[serde(default = "default_unread_poll_secs")]
    unread_poll_secs: u64,
    #[serde(default = "default_notifications_poll_secs")]
    notifications_poll_secs: u64,
    /// 0 disables periodic metrics logging
    #[serde(default = "default_metrics_log_secs")]
    metrics_log_secs: u64,
}

fn default_start_path() -> String {
    "/approvals".to_string()
}

fn default_unread_poll_secs() -> u64 {
    limits::UNREAD_COUNT_POLL_INTERVAL.as_secs()
}

fn default_notifications_poll_secs() -> u64 {
    limits::NOTIFICATIONS_POLL_INTERVAL.as_secs()
}

fn default_metrics_log_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            username: None,
            password: None,
            start_path: default_start_path(),
            unread_poll_secs: default_unread_poll_secs(),
            notifications_poll_secs: default_notifications_poll_secs(),
            metrics_log_secs: default_metrics_log_secs(),
        }
    }
}

impl Config {
    fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            idle_check_interval: self.client.session.idle_check_interval(),
            unread_poll_interval: Duration::from_secs(self.unread_poll_secs.max(1)),
            notifications_poll_interval: Duration::from_secs(self.notifications_poll_secs.max(1)),
            metrics_log_interval: (self.metrics_log_secs > 0)
                .then(|| Duration::from_secs(self.metrics_log_secs)),
            ..WorkerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Contract Desk v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        base_url = %config.client.base_url,
        session_file = ?config.client.session_file,
        "Loaded configuration"
    );

    let desk = Desk::builder(config.client.clone())
        .build()
        .context("Failed to build API client")?;

    sign_in(&desk, &config).await?;

    desk.watchdog.set_location(config.start_path.clone());
    if let GuardDecision::Redirect(redirect) = desk.guard.check(&config.start_path) {
        bail!("Session is not usable, redirected to {}", redirect.location());
    }

    show_board(&desk).await;

    let feed = Arc::new(NotificationFeed::new());
    let scheduler = Arc::new(WorkerScheduler::new(
        config.worker(),
        desk.watchdog.clone(),
        desk.profile.clone(),
        feed.clone(),
    ));
    let workers = scheduler.start();

    let mut unread = feed.subscribe_unread();
    let badge = tokio::spawn(async move {
        while unread.changed().await.is_ok() {
            let count = *unread.borrow_and_update();
            info!(unread = count, "Unread notifications");
        }
    });

    shutdown_signal().await;

    info!("Shutting down...");
    badge.abort();
    workers.shutdown().await;
    log_snapshot();

    info!("Shutdown complete");
    Ok(())
}

/// Restore the persisted session, or log in with configured credentials.
async fn sign_in(desk: &Desk, config: &Config) -> Result<()> {
    if desk
        .auth
        .restore()
        .await
        .context("Failed to restore session")?
    {
        info!(user = %desk.store.user_identifier(), "Session restored");
        return Ok(());
    }

    let (Some(username), Some(password)) = (&config.username, &config.password) else {
        bail!("No usable session; set DESK_USERNAME and DESK_PASSWORD to sign in");
    };
    let me = desk
        .auth
        .login(&LoginPayload::new(username.clone(), password.clone()))
        .await
        .context("Login failed")?;
    info!(
        user = %me.user.identifier(),
        permissions = me.permissions.len(),
        "Signed in"
    );
    Ok(())
}

/// Load the approval board and log one line per subject.
async fn show_board(desk: &Desk) {
    if !desk.store.can_audit() {
        info!("No approval permission, skipping approval board");
        return;
    }
    match desk.board.load().await {
        Ok(groups) => {
            info!(subjects = groups.len(), total = desk.board.total(), "Approval board loaded");
            for group in groups.iter() {
                info!(
                    teacher = %group.teacher_name,
                    department = %group.department,
                    contract = %group.contract_id,
                    status = ?group.overall_status,
                    progress = group.progress_percent(),
                    priority = ?group.highest_priority,
                    due = %group.earliest_due_date,
                    actionable = group.has_operable_task,
                    "Approval subject"
                );
            }
        }
        Err(e) => warn!(error = %e, "Failed to load approval board"),
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("DESK")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat aliases; the config crate expects DESK__CLIENT__BASE_URL style keys
    if let Ok(username) = std::env::var("DESK_USERNAME") {
        config.username = Some(username);
    }
    if let Ok(password) = std::env::var("DESK_PASSWORD") {
        config.password = Some(password);
    }
    if let Ok(base_url) = std::env::var("DESK_API_BASE_URL") {
        config.client.base_url = base_url;
    }
    if let Ok(path) = std::env::var("DESK_SESSION_FILE") {
        config.client.session_file = Some(path.into());
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
