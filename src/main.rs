// src/main.rs
use dotenv::dotenv;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use portal::common::{safe_email_log, PortalConfig, PortalError, PortalState};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = PortalConfig::from_env();
    info!(
        database = %config.database_url,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        window = config.notification_window,
        "Portal configuration loaded"
    );

    let (email, password) = match (config.agent.email.clone(), config.agent.password.clone()) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            warn!("PORTAL_EMAIL and PORTAL_PASSWORD must be set to start a session");
            return Ok(());
        }
    };
    let display_name = config.agent.display_name.clone();

    // ========================================================================
    // STORE + SERVICES
    // ========================================================================

    let state = PortalState::connect(config).await?;
    info!("Document store ready");

    // ========================================================================
    // SESSION
    // ========================================================================

    let session = match state.sessions.sign_in(&email, &password).await {
        Ok(session) => session,
        Err(PortalError::InvalidCredentials) => {
            info!(email = %safe_email_log(&email), "No account yet, creating one");
            state
                .sessions
                .create_account(&email, &password, &display_name)
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    if session.degraded {
        warn!(user_id = %session.user_id(), "Running with a degraded profile");
    }
    info!(
        user_id = %session.user_id(),
        name = %session.user.display_name,
        role = ?session.user.role,
        "Signed in"
    );

    let provider_watch = state.sessions.watch_provider();
    state.notifications.start(session.user_id()).await?;
    info!(
        unread = state.notifications.unread_count().await,
        "Notification center listening"
    );

    let mut toasts = state.notifications.toasts();
    let toast_task = tokio::spawn(async move {
        loop {
            match toasts.recv().await {
                Ok(toast) => info!(toast = %toast.message(), "Notification received"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Toast stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    state.notifications.stop().await;
    state.sessions.sign_out().await?;
    provider_watch.abort();
    toast_task.abort();

    info!("Signed out");
    Ok(())
}
