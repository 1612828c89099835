// Portal state shared across all modules

use std::sync::Arc;

use super::config::PortalConfig;
use super::error::PortalResult;
use crate::identity::{AuthContext, IdentityProvider, LocalIdentityProvider};
use crate::invoices::InvoiceService;
use crate::messages::MessageService;
use crate::notifications::{NotificationCenter, NotificationDispatcher};
use crate::profile::{ProfileDrawer, ProfileResolver, ProfileService};
use crate::projects::{ApplicationService, ProjectService};
use crate::session::{PresenceService, SessionManager};
use crate::store::{DocumentStore, MemoryStore, PortalRules, SqliteStore};

/// Every service of the portal, wired to one document store and one
/// identity provider
#[derive(Clone)]
pub struct PortalState {
    pub config: PortalConfig,
    pub auth: AuthContext,
    pub store: Arc<dyn DocumentStore>,
    /// Local fallback for profile reads
    pub cache: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionManager,
    pub notifications: NotificationCenter,
    pub dispatcher: NotificationDispatcher,
    pub profiles: ProfileService,
    pub drawer: ProfileDrawer,
    pub projects: ProjectService,
    pub applications: ApplicationService,
    pub messages: MessageService,
    pub invoices: InvoiceService,
}

impl PortalState {
    pub fn new(
        config: PortalConfig,
        auth: AuthContext,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let cache: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone());
        let presence = PresenceService::new(store.clone(), config.heartbeat_interval);
        let projects = ProjectService::new(store.clone(), dispatcher.clone());

        Self {
            sessions: SessionManager::new(identity.clone(), store.clone(), presence),
            notifications: NotificationCenter::new(
                store.clone(),
                config.notification_window,
                config.toast_recency,
            ),
            profiles: ProfileService::new(store.clone()),
            drawer: ProfileDrawer::new(ProfileResolver::new(store.clone(), cache.clone())),
            applications: ApplicationService::new(
                store.clone(),
                projects.clone(),
                dispatcher.clone(),
            ),
            projects,
            messages: MessageService::new(store.clone(), dispatcher.clone()),
            invoices: InvoiceService::new(store.clone(), dispatcher.clone()),
            dispatcher,
            config,
            auth,
            store,
            cache,
            identity,
        }
    }

    /// In-process backend with the portal's access rules
    pub fn in_memory(config: PortalConfig) -> Self {
        let auth = AuthContext::new();
        let store = Arc::new(MemoryStore::with_rules(Arc::new(PortalRules), auth.clone()));
        let identity = Arc::new(LocalIdentityProvider::new(
            auth.clone(),
            config.jwt_secret.clone(),
            config.session_ttl_hours,
        ));
        Self::new(config, auth, store, identity)
    }

    /// SQLite-backed store from `config.database_url`
    ///
    /// Accounts live in the same database through an unruled handle, so
    /// uids survive restarts.
    pub async fn connect(config: PortalConfig) -> PortalResult<Self> {
        let auth = AuthContext::new();
        let raw = SqliteStore::connect(&config.database_url, config.reset_db).await?;
        let store = raw
            .clone()
            .with_rules(Arc::new(PortalRules), auth.clone());
        let identity = Arc::new(
            LocalIdentityProvider::new(
                auth.clone(),
                config.jwt_secret.clone(),
                config.session_ttl_hours,
            )
            .with_store(Arc::new(raw)),
        );
        Ok(Self::new(config, auth, Arc::new(store), identity))
    }
}
