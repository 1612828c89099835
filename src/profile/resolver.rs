use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{ProfileHint, ProfileSource, ProfileView, PublicProfile};
use crate::common::PortalError;
use crate::session::models::User;
use crate::store::{DocumentStore, DocumentStoreExt};

enum Primary {
    Found(User),
    Missing,
    Denied,
}

/// Ordered fallback resolver for profile reads
///
/// `users/{id}` first; on denial the public projection; then the local
/// cache; finally a placeholder built from the caller's hint. Each step runs
/// once, no retries.
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn DocumentStore>,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<dyn DocumentStore>) -> Self {
        Self { store, cache }
    }

    pub async fn resolve(&self, user_id: &str, hint: &ProfileHint) -> ProfileView {
        match self.primary(user_id).await {
            Primary::Found(user) => {
                self.remember(&user).await;
                ProfileView::full(user, ProfileSource::Store)
            }
            Primary::Missing => match self.cached(user_id).await {
                Some(user) => ProfileView::full(with_hint(user, hint), ProfileSource::Cache),
                None => placeholder(user_id, hint),
            },
            Primary::Denied => {
                if let Some(user) = self.public(user_id).await {
                    return ProfileView::restricted(
                        with_hint(user, hint),
                        ProfileSource::PublicProfile,
                    );
                }
                match self.cached(user_id).await {
                    Some(user) => {
                        ProfileView::restricted(with_hint(user, hint), ProfileSource::Cache)
                    }
                    None => placeholder(user_id, hint),
                }
            }
        }
    }

    async fn primary(&self, user_id: &str) -> Primary {
        match self.store.get_as::<User>("users", user_id).await {
            Ok(Some(user)) => Primary::Found(user),
            Ok(None) => {
                debug!(user_id = %user_id, "Profile not found");
                Primary::Missing
            }
            Err(PortalError::PermissionDenied(_)) => {
                info!(user_id = %user_id, "Profile read denied, falling back to restricted view");
                Primary::Denied
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile read failed");
                Primary::Missing
            }
        }
    }

    async fn public(&self, user_id: &str) -> Option<User> {
        match self
            .store
            .get_as::<PublicProfile>("public_profiles", user_id)
            .await
        {
            Ok(profile) => profile.map(User::from),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Public profile read failed");
                None
            }
        }
    }

    async fn cached(&self, user_id: &str) -> Option<User> {
        match self.cache.get_as::<User>("users", user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile cache read failed");
                None
            }
        }
    }

    /// Keep a copy of a successful read for later fallbacks
    async fn remember(&self, user: &User) {
        if let Err(e) = self.cache.set_as("users", &user.id, user, false).await {
            debug!(user_id = %user.id, error = %e, "Could not cache profile");
        }
    }
}

/// Fill gaps in a fallback result with what the caller already showed
fn with_hint(mut user: User, hint: &ProfileHint) -> User {
    if user.display_name.trim().is_empty() {
        if let Some(name) = &hint.display_name {
            user.display_name = name.clone();
        }
    }
    if user.avatar_url.is_none() {
        user.avatar_url = hint.avatar_url.clone();
    }
    user
}

fn placeholder(user_id: &str, hint: &ProfileHint) -> ProfileView {
    debug!(user_id = %user_id, "Using placeholder profile");
    let user = User {
        id: user_id.to_string(),
        display_name: hint
            .display_name
            .clone()
            .unwrap_or_else(|| "Unknown user".to_string()),
        avatar_url: hint.avatar_url.clone(),
        ..Default::default()
    };
    ProfileView::restricted(user, ProfileSource::Placeholder)
}
