// src/session/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::helpers::{
    deserialize_optional_amount, deserialize_optional_timestamp, deserialize_string_list,
};
use crate::identity::AuthUser;

// ============================================================================
// User Models
// ============================================================================

/// Portal role; anything unrecognised is treated as a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Freelancer,
    #[default]
    #[serde(other)]
    Client,
}

/// The `users/{id}` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub hourly_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub portfolio: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub contact_links: Vec<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Minimal identity built from the provider's basic claims
    pub fn from_auth(auth: &AuthUser) -> Self {
        let display_name = auth
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                auth.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Portal user".to_string());

        Self {
            id: auth.uid.clone(),
            display_name,
            email: auth.email.clone(),
            avatar_url: auth.photo_url.clone(),
            ..Default::default()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ============================================================================
// Session Models
// ============================================================================

/// An active portal session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub auth: AuthUser,
    pub token: String,
    /// The user record could not be read; `user` was derived from the
    /// provider's claims
    pub degraded: bool,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.auth.uid
    }
}
