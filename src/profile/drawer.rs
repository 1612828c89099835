use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::models::{ProfileHint, ProfileView};
use super::resolver::ProfileResolver;

#[derive(Default)]
struct DrawerState {
    generation: u64,
    requested: Option<String>,
    current: Option<ProfileView>,
    loading: bool,
}

/// The profile currently shown to the user
///
/// Opening a profile supersedes any request still in flight; a response is
/// only applied if it belongs to the latest request for the same user.
#[derive(Clone)]
pub struct ProfileDrawer {
    resolver: ProfileResolver,
    state: Arc<Mutex<DrawerState>>,
}

impl ProfileDrawer {
    pub fn new(resolver: ProfileResolver) -> Self {
        Self {
            resolver,
            state: Arc::new(Mutex::new(DrawerState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DrawerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve and show `user_id`; `None` when a newer request superseded
    /// this one before it finished
    pub async fn open(&self, user_id: &str, hint: ProfileHint) -> Option<ProfileView> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.requested = Some(user_id.to_string());
            state.loading = true;
            state.generation
        };

        let view = self.resolver.resolve(user_id, &hint).await;

        let mut state = self.lock();
        if state.generation != generation || state.requested.as_deref() != Some(user_id) {
            debug!(
                user_id = %user_id,
                generation = generation,
                "Discarding stale profile response"
            );
            return None;
        }

        state.current = Some(view.clone());
        state.loading = false;
        Some(view)
    }

    pub fn close(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.requested = None;
        state.current = None;
        state.loading = false;
    }

    pub fn current(&self) -> Option<ProfileView> {
        self.lock().current.clone()
    }

    pub fn requested(&self) -> Option<String> {
        self.lock().requested.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }
}
