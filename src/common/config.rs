// src/common/config.rs
//! Runtime configuration read from the environment
//!
//! `main` calls `dotenv().ok()` first, so a `.env` file in the working
//! directory is honoured as well.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    /// How often an active session refreshes `online` / `last_seen`
    pub heartbeat_interval: Duration,
    /// Notifications older than this are never surfaced as toasts
    pub toast_recency: Duration,
    /// Upper bound on the live notification query
    pub notification_window: usize,
    pub reset_db: bool,
    pub agent: AgentCredentials,
}

/// Credentials the headless agent signs in with
#[derive(Debug, Clone)]
pub struct AgentCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: String,
}

impl PortalConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://portal.db".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "replace_with_strong_secret".to_string()),
            session_ttl_hours: parse_or("SESSION_TTL_HOURS", 24),
            heartbeat_interval: Duration::from_secs(parse_or("HEARTBEAT_INTERVAL_SECS", 30u64).max(1)),
            toast_recency: Duration::from_secs(parse_or("TOAST_RECENCY_SECS", 30)),
            notification_window: parse_or("NOTIFICATION_WINDOW", 100),
            reset_db: env::var("RESET_DB")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                == "true",
            agent: AgentCredentials {
                email: env::var("PORTAL_EMAIL").ok(),
                password: env::var("PORTAL_PASSWORD").ok(),
                display_name: env::var("PORTAL_NAME")
                    .unwrap_or_else(|_| "Portal Agent".to_string()),
            },
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "replace_with_strong_secret".to_string(),
            session_ttl_hours: 24,
            heartbeat_interval: Duration::from_secs(30),
            toast_recency: Duration::from_secs(30),
            notification_window: 100,
            reset_db: false,
            agent: AgentCredentials {
                email: None,
                password: None,
                display_name: "Portal Agent".to_string(),
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PortalConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.toast_recency, Duration::from_secs(30));
        assert_eq!(config.notification_window, 100);
        assert!(!config.reset_db);
    }

    #[test]
    fn test_zero_heartbeat_interval_is_raised() {
        env::set_var("HEARTBEAT_INTERVAL_SECS", "0");
        let config = PortalConfig::from_env();
        env::remove_var("HEARTBEAT_INTERVAL_SECS");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("PORTAL_TEST_WINDOW", "not-a-number");
        assert_eq!(parse_or("PORTAL_TEST_WINDOW", 100usize), 100);

        env::set_var("PORTAL_TEST_WINDOW", " 25 ");
        assert_eq!(parse_or("PORTAL_TEST_WINDOW", 100usize), 25);

        env::remove_var("PORTAL_TEST_WINDOW");
        assert_eq!(parse_or("PORTAL_TEST_WINDOW", 7usize), 7);
    }
}
