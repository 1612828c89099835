use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::presence_service::PresenceService;
use crate::common::{safe_email_log, PortalResult};
use crate::identity::{
    AuthSession, AuthUser, FederatedAssertion, IdentityProvider, SessionEvent, SignOutHook,
};
use crate::profile::PublicProfile;
use crate::session::models::{Session, User};
use crate::store::{DocumentStore, DocumentStoreExt};

/// Owns the current session: bootstraps the user record after
/// authentication, runs presence and tears everything down on sign-out
#[derive(Clone)]
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    presence: PresenceService,
    state: Arc<watch::Sender<Option<Session>>>,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        presence: PresenceService,
    ) -> Self {
        let (state, _) = watch::channel(None);
        let state = Arc::new(state);
        identity.on_sign_out(Arc::new(Teardown {
            presence: presence.clone(),
            state: state.clone(),
        }));
        Self {
            identity,
            store,
            presence,
            state,
        }
    }

    pub fn presence(&self) -> &PresenceService {
        &self.presence
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> PortalResult<Session> {
        let auth = self.identity.sign_in(email, password).await.map_err(|e| {
            warn!(email = %safe_email_log(email), error = %e, "Sign-in failed");
            e
        })?;
        Ok(self.establish(auth, None).await)
    }

    pub async fn sign_in_federated(&self, assertion: FederatedAssertion) -> PortalResult<Session> {
        let provider = assertion.provider.clone();
        let auth = self
            .identity
            .sign_in_federated(assertion)
            .await
            .map_err(|e| {
                warn!(provider = %provider, error = %e, "Federated sign-in failed");
                e
            })?;
        Ok(self.establish(auth, None).await)
    }

    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> PortalResult<Session> {
        let auth = self.identity.create_account(email, password).await?;
        let display_name = Some(display_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(self.establish(auth, display_name).await)
    }

    /// Current session, if any
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Receive every session change
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Tab-close path: stop the heartbeat and write offline, keeping the
    /// provider session so `resume` can pick it up again
    pub async fn suspend(&self) {
        self.presence.stop().await;
        if let Some(session) = self.current() {
            self.presence.mark_offline(session.user_id()).await;
            info!(user_id = %session.user_id(), "Session suspended");
        }
    }

    pub async fn resume(&self) {
        if let Some(session) = self.current() {
            self.presence.start(session.user_id()).await;
            info!(user_id = %session.user_id(), "Session resumed");
        }
    }

    /// Stop the heartbeat, write offline, then sign out of the provider
    pub async fn sign_out(&self) -> PortalResult<()> {
        self.teardown().await;
        self.identity.sign_out().await
    }

    /// Follow the provider's session events
    ///
    /// Provider-initiated sign-outs are torn down by the sign-out hook while
    /// the user is still the caller; this clears whatever local state is left
    /// if an event arrives for the active uid anyway.
    pub fn watch_provider(&self) -> JoinHandle<()> {
        let mut events = self.identity.subscribe();
        let manager = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedOut { uid }) => {
                        let active = manager
                            .current()
                            .map(|session| session.auth.uid == uid)
                            .unwrap_or(false);
                        if active {
                            info!(user_id = %uid, "Provider ended the session");
                            manager.teardown().await;
                        }
                    }
                    Ok(SessionEvent::SignedIn(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Session events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn teardown(&self) {
        end_session(&self.presence, &self.state).await;
    }

    async fn establish(&self, auth: AuthSession, display_name: Option<String>) -> Session {
        let (user, degraded) = self.resolve_user(&auth.user, display_name).await;

        let session = Session {
            user,
            auth: auth.user,
            token: auth.token,
            degraded,
        };

        self.presence.start(session.user_id()).await;
        self.state.send_replace(Some(session.clone()));

        info!(
            user_id = %session.user_id(),
            degraded = session.degraded,
            "Session established"
        );
        session
    }

    /// Read the user record, creating it on first sign-in
    ///
    /// Any read failure degrades to an identity built from the provider's
    /// claims instead of failing the session.
    async fn resolve_user(&self, auth: &AuthUser, display_name: Option<String>) -> (User, bool) {
        match self.store.get_as::<User>("users", &auth.uid).await {
            Ok(Some(user)) => (user, false),
            Ok(None) => {
                let mut user = User::from_auth(auth);
                if let Some(name) = display_name {
                    user.display_name = name;
                }
                user.created_at = Some(Utc::now());

                match self.store.set_as("users", &auth.uid, &user, false).await {
                    Ok(()) => {
                        info!(user_id = %auth.uid, "User record created");
                        self.publish_profile(&user).await;
                        (user, false)
                    }
                    Err(e) => {
                        warn!(user_id = %auth.uid, error = %e, "Could not create user record");
                        (user, true)
                    }
                }
            }
            Err(e) if e.is_permission_denied() => {
                warn!(user_id = %auth.uid, "User record denied, using provider claims");
                (User::from_auth(auth), true)
            }
            Err(e) => {
                error!(user_id = %auth.uid, error = %e, "User record unreadable, using provider claims");
                (User::from_auth(auth), true)
            }
        }
    }

    async fn publish_profile(&self, user: &User) {
        let profile = PublicProfile::from(user);
        if let Err(e) = self
            .store
            .set_as("public_profiles", &user.id, &profile, true)
            .await
        {
            warn!(user_id = %user.id, error = %e, "Could not publish public profile");
        }
    }
}

/// Stop the heartbeat, write offline and clear the session
async fn end_session(presence: &PresenceService, state: &watch::Sender<Option<Session>>) {
    let user_id = presence
        .stop()
        .await
        .or_else(|| state.borrow().as_ref().map(|s| s.auth.uid.clone()));

    if let Some(user_id) = &user_id {
        presence.mark_offline(user_id).await;
    }
    state.send_replace(None);

    if let Some(user_id) = user_id {
        info!(user_id = %user_id, "Session ended");
    }
}

/// Runs the teardown for sign-outs the manager did not start itself
/// (expiry, another tab, a different account signing in)
struct Teardown {
    presence: PresenceService,
    state: Arc<watch::Sender<Option<Session>>>,
}

#[async_trait]
impl SignOutHook for Teardown {
    async fn before_sign_out(&self, user: &AuthUser) {
        let active = self
            .state
            .borrow()
            .as_ref()
            .map(|session| session.auth.uid == user.uid)
            .unwrap_or(false);
        if active {
            info!(user_id = %user.uid, "Provider is ending the session");
            end_session(&self.presence, &self.state).await;
        }
    }
}
