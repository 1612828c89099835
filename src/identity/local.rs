//! In-process identity provider
//!
//! Keeps accounts in a document store collection, hashes passwords with
//! Argon2id and issues HS256 session tokens. Stands in for the hosted auth
//! service in the headless agent and in tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::models::{AuthContext, AuthSession, AuthUser, Claims, FederatedAssertion, SessionEvent};
use super::password::{hash_password, verify_password};
use super::{IdentityProvider, SignOutHook};
use crate::common::{generate_user_id, safe_email_log, PortalError, PortalResult};
use crate::store::{DocumentStore, DocumentStoreExt, MemoryStore, Query};

const MIN_PASSWORD_LENGTH: usize = 6;
const ACCOUNTS: &str = "accounts";

/// Stored form of an account, keyed by uid
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    uid: String,
    /// Lowercased
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    provider: String,
    password_hash: Option<String>,
    /// "provider:subject" for federated accounts
    federated_key: Option<String>,
}

impl AccountRecord {
    fn user(&self) -> AuthUser {
        AuthUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider: self.provider.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LocalIdentityProvider {
    // Unruled handle; account records are never exposed to portal callers
    store: Arc<dyn DocumentStore>,
    // Serializes account creation and federated linking
    registration: Arc<Mutex<()>>,
    hooks: Arc<RwLock<Vec<Arc<dyn SignOutHook>>>>,
    context: AuthContext,
    events: broadcast::Sender<SessionEvent>,
    jwt_secret: String,
    session_ttl: Duration,
}

impl LocalIdentityProvider {
    pub fn new(context: AuthContext, jwt_secret: impl Into<String>, session_ttl_hours: i64) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            store: Arc::new(MemoryStore::new()),
            registration: Arc::new(Mutex::new(())),
            hooks: Arc::new(RwLock::new(Vec::new())),
            context,
            events,
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Keep accounts in `store` so they outlive the process
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = store;
        self
    }

    /// Validate a session token issued by this provider
    pub fn verify_token(&self, token: &str) -> PortalResult<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }

    async fn find(&self, field: &str, value: &str) -> PortalResult<Vec<AccountRecord>> {
        self.store
            .query(&Query::new(ACCOUNTS).where_eq(field, value))
            .await?
            .iter()
            .map(|doc| doc.decode())
            .collect()
    }

    async fn run_hooks(&self, user: &AuthUser) {
        let hooks = self
            .hooks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for hook in hooks {
            hook.before_sign_out(user).await;
        }
    }

    /// End the current provider session; hooks see `user` as the caller
    async fn end_session(&self, user: AuthUser) {
        self.run_hooks(&user).await;
        self.context.set(None);
        // No subscribers is fine
        let _ = self.events.send(SessionEvent::SignedOut {
            uid: user.uid.clone(),
        });
        info!(uid = %user.uid, "Signed out");
    }

    async fn issue(&self, user: AuthUser) -> PortalResult<AuthSession> {
        let expires_at = Utc::now() + self.session_ttl;
        let claims = Claims {
            sub: user.uid.clone(),
            exp: expires_at.timestamp() as usize,
            email: user.email.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        if let Some(previous) = self.context.current() {
            if previous.uid != user.uid {
                info!(previous = %previous.uid, uid = %user.uid, "Replacing active session");
                self.end_session(previous).await;
            }
        }

        self.context.set(Some(user.clone()));
        let _ = self.events.send(SessionEvent::SignedIn(user.clone()));

        info!(uid = %user.uid, provider = %user.provider, "Session issued");

        Ok(AuthSession {
            user,
            token,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<AuthSession> {
        let key = email.trim().to_lowercase();
        let accounts = self.find("email", &key).await?;

        if accounts.is_empty() {
            warn!(email = %safe_email_log(&key), "Sign-in for unknown account");
            return Err(PortalError::InvalidCredentials);
        }

        let Some((account, hash)) = accounts
            .iter()
            .find_map(|a| a.password_hash.as_deref().map(|hash| (a, hash)))
        else {
            warn!(email = %safe_email_log(&key), "Password sign-in for federated-only account");
            return Err(PortalError::InvalidCredentials);
        };

        if !verify_password(password, hash)? {
            warn!(uid = %account.uid, "Password mismatch");
            return Err(PortalError::InvalidCredentials);
        }

        self.issue(account.user()).await
    }

    async fn sign_in_federated(&self, assertion: FederatedAssertion) -> PortalResult<AuthSession> {
        if assertion.subject.trim().is_empty() {
            return Err(PortalError::Validation(
                "federated assertion is missing a subject".to_string(),
            ));
        }

        let key = format!("{}:{}", assertion.provider, assertion.subject);

        let user = {
            let _guard = self.registration.lock().await;
            let existing = self.find("federated_key", &key).await?.into_iter().next();

            let record = match existing {
                Some(mut record) => {
                    // The provider's latest claims win
                    if assertion.name.is_some() {
                        record.display_name = assertion.name.clone();
                    }
                    if assertion.picture.is_some() {
                        record.photo_url = assertion.picture.clone();
                    }
                    record
                }
                None => {
                    let record = AccountRecord {
                        uid: generate_user_id(),
                        email: assertion.email.as_deref().map(|e| e.trim().to_lowercase()),
                        display_name: assertion.name.clone(),
                        photo_url: assertion.picture.clone(),
                        provider: assertion.provider.clone(),
                        password_hash: None,
                        federated_key: Some(key),
                    };
                    debug!(uid = %record.uid, provider = %record.provider, "Federated account linked");
                    record
                }
            };

            self.store.set_as(ACCOUNTS, &record.uid, &record, false).await?;
            record.user()
        };

        self.issue(user).await
    }

    async fn create_account(&self, email: &str, password: &str) -> PortalResult<AuthSession> {
        let key = email.trim().to_lowercase();
        if !key.contains('@') {
            return Err(PortalError::Validation("email address is invalid".to_string()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(PortalError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let user = {
            let _guard = self.registration.lock().await;
            if !self.find("email", &key).await?.is_empty() {
                return Err(PortalError::Conflict("email already in use".to_string()));
            }

            let record = AccountRecord {
                uid: generate_user_id(),
                email: Some(key.clone()),
                display_name: None,
                photo_url: None,
                provider: "password".to_string(),
                password_hash: Some(hash_password(password)?),
                federated_key: None,
            };
            self.store.set_as(ACCOUNTS, &record.uid, &record, false).await?;
            record.user()
        };

        info!(uid = %user.uid, email = %safe_email_log(&key), "Account created");
        self.issue(user).await
    }

    async fn sign_out(&self) -> PortalResult<()> {
        if let Some(user) = self.context.current() {
            self.end_session(user).await;
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.context.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn on_sign_out(&self, hook: Arc<dyn SignOutHook>) {
        self.hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(hook);
    }
}
