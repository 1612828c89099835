//! Tests for profile module
//!
//! These tests verify:
//! - the profile fallback chain (store, public projection, cache, placeholder)
//! - restricted views hiding sensitive sections
//! - the drawer discarding superseded responses
//! - profile update validation and the public projection

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::{PortalResult, ValidationResult, Validator};
    use crate::identity::{AuthContext, AuthUser};
    use crate::session::models::User;
    use crate::store::{
        fields, Document, DocumentStore, DocumentStoreExt, Fields, MemoryStore, PortalRules, Query,
        Subscription, WriteBatch,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn caller(uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            email: None,
            display_name: None,
            photo_url: None,
            provider: "password".to_string(),
        }
    }

    fn bob() -> User {
        User {
            id: "U_BOB".to_string(),
            display_name: "Bob Builder".to_string(),
            email: Some("bob@example.com".to_string()),
            avatar_url: Some("https://example.com/bob.png".to_string()),
            skills: vec!["carpentry".to_string()],
            portfolio: vec!["https://example.com/shed".to_string()],
            contact_links: vec!["mailto:bob@example.com".to_string()],
            ..Default::default()
        }
    }

    /// Store with owner-only user documents, Alice signed in
    async fn ruled_store(with_public: bool) -> (AuthContext, Arc<MemoryStore>) {
        let auth = AuthContext::new();
        let store = Arc::new(MemoryStore::with_rules(Arc::new(PortalRules), auth.clone()));

        auth.set(Some(caller("U_BOB")));
        store.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        if with_public {
            store
                .set_as("public_profiles", "U_BOB", &PublicProfile::from(&bob()), false)
                .await
                .unwrap();
        }

        auth.set(Some(caller("U_ALICE")));
        (auth, store)
    }

    // ============================================================================
    // Fallback chain
    // ============================================================================

    #[tokio::test]
    async fn test_full_profile_is_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryStore::new());
        store.set_as("users", "U_BOB", &bob(), false).await.unwrap();

        let resolver = ProfileResolver::new(store.clone(), cache.clone());
        let view = resolver.resolve("U_BOB", &ProfileHint::default()).await;

        assert_eq!(view.source, ProfileSource::Store);
        assert!(!view.restricted);
        assert!(view.shows(ProfileSection::Skills));
        assert_eq!(view.user.skills, vec!["carpentry"]);

        let cached = cache.get_as::<User>("users", "U_BOB").await.unwrap();
        assert_eq!(cached, Some(bob()));
    }

    #[tokio::test]
    async fn test_missing_profile_uses_cache_then_placeholder() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryStore::new());
        cache.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        let resolver = ProfileResolver::new(store, cache);

        let view = resolver.resolve("U_BOB", &ProfileHint::default()).await;
        assert_eq!(view.source, ProfileSource::Cache);
        assert!(!view.restricted);

        let hint = ProfileHint::new("Carol", Some("https://example.com/carol.png".to_string()));
        let view = resolver.resolve("U_CAROL", &hint).await;
        assert_eq!(view.source, ProfileSource::Placeholder);
        assert!(view.restricted);
        assert_eq!(view.user.display_name, "Carol");
        assert_eq!(view.user.avatar_url.as_deref(), Some("https://example.com/carol.png"));

        let view = resolver.resolve("U_NOBODY", &ProfileHint::default()).await;
        assert_eq!(view.user.display_name, "Unknown user");
    }

    #[tokio::test]
    async fn test_denied_profile_shows_restricted_public_projection() {
        let (_auth, store) = ruled_store(true).await;
        let resolver = ProfileResolver::new(store, Arc::new(MemoryStore::new()));

        let view = resolver.resolve("U_BOB", &ProfileHint::default()).await;

        assert_eq!(view.source, ProfileSource::PublicProfile);
        assert!(view.restricted);
        assert_eq!(view.user.display_name, "Bob Builder");
        assert_eq!(view.user.avatar_url.as_deref(), Some("https://example.com/bob.png"));
        assert!(view.shows(ProfileSection::Overview));
        assert!(!view.shows(ProfileSection::Skills));
        assert!(!view.shows(ProfileSection::Portfolio));
        assert!(!view.shows(ProfileSection::Contact));
    }

    #[tokio::test]
    async fn test_denied_profile_strips_cached_sensitive_fields() {
        let (_auth, store) = ruled_store(false).await;
        let cache = Arc::new(MemoryStore::new());
        cache.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        let resolver = ProfileResolver::new(store, cache);

        let view = resolver.resolve("U_BOB", &ProfileHint::default()).await;

        assert_eq!(view.source, ProfileSource::Cache);
        assert!(view.restricted);
        assert_eq!(view.user.display_name, "Bob Builder");
        assert!(view.user.skills.is_empty());
        assert!(view.user.portfolio.is_empty());
        assert!(view.user.contact_links.is_empty());
        assert!(view.user.email.is_none());
    }

    #[tokio::test]
    async fn test_denied_profile_without_fallbacks_uses_hint() {
        let (_auth, store) = ruled_store(false).await;
        let resolver = ProfileResolver::new(store, Arc::new(MemoryStore::new()));

        let view = resolver
            .resolve("U_BOB", &ProfileHint::new("Bob from the list", None))
            .await;
        assert_eq!(view.source, ProfileSource::Placeholder);
        assert!(view.restricted);
        assert_eq!(view.user.display_name, "Bob from the list");
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryStore::new());
        cache.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        store.set_offline(true);

        let resolver = ProfileResolver::new(store, cache);
        let view = resolver.resolve("U_BOB", &ProfileHint::default()).await;
        assert_eq!(view.source, ProfileSource::Cache);
    }

    // ============================================================================
    // Drawer
    // ============================================================================

    /// Delegating store that answers reads for one document slowly
    struct SlowStore {
        inner: MemoryStore,
        slow_id: String,
        delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn get(&self, collection: &str, id: &str) -> PortalResult<Option<Document>> {
            if id == self.slow_id {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.get(collection, id).await
        }

        async fn set(&self, collection: &str, id: &str, data: Fields, merge: bool) -> PortalResult<()> {
            self.inner.set(collection, id, data, merge).await
        }

        async fn update(&self, collection: &str, id: &str, data: Fields) -> PortalResult<()> {
            self.inner.update(collection, id, data).await
        }

        async fn add(&self, collection: &str, data: Fields) -> PortalResult<String> {
            self.inner.add(collection, data).await
        }

        async fn delete(&self, collection: &str, id: &str) -> PortalResult<()> {
            self.inner.delete(collection, id).await
        }

        async fn query(&self, query: &Query) -> PortalResult<Vec<Document>> {
            self.inner.query(query).await
        }

        async fn watch(&self, query: Query) -> PortalResult<Subscription> {
            self.inner.watch(query).await
        }

        async fn commit(&self, batch: WriteBatch) -> PortalResult<()> {
            self.inner.commit(batch).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drawer_discards_stale_response() {
        let inner = MemoryStore::new();
        inner.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        inner
            .set("users", "U_CAROL", fields(json!({"display_name": "Carol"})), false)
            .await
            .unwrap();

        let store = Arc::new(SlowStore {
            inner,
            slow_id: "U_BOB".to_string(),
            delay: Duration::from_secs(5),
        });
        let drawer = ProfileDrawer::new(ProfileResolver::new(store, Arc::new(MemoryStore::new())));

        let slow = {
            let drawer = drawer.clone();
            tokio::spawn(async move { drawer.open("U_BOB", ProfileHint::default()).await })
        };
        while drawer.requested().as_deref() != Some("U_BOB") {
            tokio::task::yield_now().await;
        }

        let fast = drawer.open("U_CAROL", ProfileHint::default()).await;
        assert_eq!(fast.map(|v| v.user.display_name), Some("Carol".to_string()));

        let stale = slow.await.unwrap();
        assert!(stale.is_none());

        let current = drawer.current().unwrap();
        assert_eq!(current.user.id, "U_CAROL");
        assert!(!drawer.is_loading());
    }

    #[tokio::test]
    async fn test_drawer_close_clears_view() {
        let store = Arc::new(MemoryStore::new());
        store.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        let drawer = ProfileDrawer::new(ProfileResolver::new(store, Arc::new(MemoryStore::new())));

        assert!(drawer.open("U_BOB", ProfileHint::default()).await.is_some());
        assert!(drawer.current().is_some());

        drawer.close();
        assert!(drawer.current().is_none());
        assert!(drawer.requested().is_none());
    }

    // ============================================================================
    // Updates
    // ============================================================================

    #[test]
    fn test_update_profile_validator() {
        let validator = validators::UpdateProfileValidator;

        let ok = UpdateProfileRequest {
            display_name: Some("Ada".to_string()),
            hourly_rate: Some(95.0),
            contact_links: Some(vec!["mailto:ada@example.com".to_string()]),
            ..Default::default()
        };
        assert!(validator.validate(&ok).is_valid);

        let bad = UpdateProfileRequest {
            display_name: Some("  ".to_string()),
            avatar_url: Some("ftp://example.com/a.png".to_string()),
            hourly_rate: Some(-1.0),
            portfolio: Some(vec!["example.com".to_string()]),
            ..Default::default()
        };
        let result: ValidationResult = validator.validate(&bad);
        assert!(!result.is_valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"display_name"));
        assert!(fields.contains(&"avatar_url"));
        assert!(fields.contains(&"hourly_rate"));
        assert!(fields.contains(&"portfolio"));
    }

    #[tokio::test]
    async fn test_update_profile_refreshes_public_projection() {
        let store = Arc::new(MemoryStore::new());
        store.set_as("users", "U_BOB", &bob(), false).await.unwrap();
        let service = ProfileService::new(store.clone());

        let user = service
            .update_profile(
                "U_BOB",
                UpdateProfileRequest {
                    display_name: Some(" Robert ".to_string()),
                    skills: Some(vec!["roofing".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(user.display_name, "Robert");
        assert_eq!(user.skills, vec!["roofing"]);
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));

        let public = store
            .get_as::<PublicProfile>("public_profiles", "U_BOB")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(public.display_name, "Robert");

        let err = service
            .update_profile(
                "U_BOB",
                UpdateProfileRequest {
                    display_name: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::common::PortalError::Validation(_)));
    }
}
