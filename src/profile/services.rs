use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{PublicProfile, UpdateProfileRequest};
use super::validators::UpdateProfileValidator;
use crate::common::{PortalError, PortalResult, Validator};
use crate::session::models::User;
use crate::store::{DocumentStore, DocumentStoreExt, Fields};

/// Profile edits by the owner
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Merge-write the given fields into `users/{user_id}` and refresh the
    /// public projection
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> PortalResult<User> {
        UpdateProfileValidator.validate(&request).into_result()?;

        let changes = changed_fields(request)?;
        if !changes.is_empty() {
            self.store.set("users", user_id, changes, true).await?;
        }

        let user = self
            .store
            .get_as::<User>("users", user_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("users/{}", user_id)))?;

        if let Err(e) = self
            .store
            .set_as("public_profiles", user_id, &PublicProfile::from(&user), true)
            .await
        {
            warn!(user_id = %user_id, error = %e, "Could not refresh public profile");
        }

        info!(user_id = %user_id, "Profile updated");
        Ok(user)
    }
}

fn changed_fields(request: UpdateProfileRequest) -> PortalResult<Fields> {
    let mut changes = Fields::new();
    let mut put = |key: &str, value: Value| {
        changes.insert(key.to_string(), value);
    };

    if let Some(v) = request.display_name {
        put("display_name", Value::String(v.trim().to_string()));
    }
    if let Some(v) = request.avatar_url {
        put("avatar_url", Value::String(v));
    }
    if let Some(v) = request.company {
        put("company", Value::String(v));
    }
    if let Some(v) = request.bio {
        put("bio", Value::String(v));
    }
    if let Some(v) = request.location {
        put("location", Value::String(v));
    }
    if let Some(v) = request.skills {
        put("skills", serde_json::to_value(v)?);
    }
    if let Some(v) = request.hourly_rate {
        put("hourly_rate", serde_json::to_value(v)?);
    }
    if let Some(v) = request.portfolio {
        put("portfolio", serde_json::to_value(v)?);
    }
    if let Some(v) = request.contact_links {
        put("contact_links", serde_json::to_value(v)?);
    }

    Ok(changes)
}
