//! Identity data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Basic claims the identity provider reports for a signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// "password" or the federated provider name
    pub provider: String,
}

/// An authenticated session issued by the provider
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Session-changed events delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(AuthUser),
    SignedOut { uid: String },
}

/// Result of a federated popup sign-in, as handed back by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedAssertion {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub email: Option<String>,
}

/// Currently authenticated caller, shared between the identity provider and
/// the document stores that enforce access rules
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    current: Arc<RwLock<Option<AuthUser>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set(&self, user: Option<AuthUser>) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = user;
    }

    pub fn uid(&self) -> Option<String> {
        self.current().map(|u| u.uid)
    }
}
