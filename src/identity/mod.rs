//! Identity provider contract
//!
//! Wraps the external authentication service: password and federated
//! sign-in, account creation, sign-out and a stream of session-changed
//! events.

pub mod local;
pub mod models;
pub mod password;


use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::common::PortalResult;

pub use local::LocalIdentityProvider;
pub use models::{AuthContext, AuthSession, AuthUser, Claims, FederatedAssertion, SessionEvent};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<AuthSession>;

    /// Complete a federated (popup) sign-in
    async fn sign_in_federated(&self, assertion: FederatedAssertion) -> PortalResult<AuthSession>;

    /// Create a password account; the new account is signed in
    async fn create_account(&self, email: &str, password: &str) -> PortalResult<AuthSession>;

    async fn sign_out(&self) -> PortalResult<()>;

    fn current_user(&self) -> Option<AuthUser>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Register work that must run before any sign-out, including ones the
    /// provider starts itself (expiry, another tab)
    fn on_sign_out(&self, hook: Arc<dyn SignOutHook>);
}

/// Runs while the user being signed out is still the authenticated caller,
/// so writes that the access rules reserve for that user still succeed
#[async_trait]
pub trait SignOutHook: Send + Sync {
    async fn before_sign_out(&self, user: &AuthUser);
}
