use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::models::{merge_fields, Document, Fields, Query, WriteBatch, WriteOp};
use super::rules::{Access, AccessPolicy, AccessRequest, AllowAll};
use super::watch::{Subscription, WatchRegistry};
use super::DocumentStore;
use crate::common::id_generator::{generate_id, EntityPrefix};
use crate::common::{PortalError, PortalResult};
use crate::identity::models::AuthContext;

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// In-process document store
///
/// Backs tests and serves as the local fallback cache for profile reads.
/// Optional access rules are evaluated against the shared `AuthContext`.
#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
    registry: WatchRegistry,
    policy: Arc<dyn AccessPolicy>,
    auth: AuthContext,
    offline: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_rules(Arc::new(AllowAll), AuthContext::new())
    }

    pub fn with_rules(policy: Arc<dyn AccessPolicy>, auth: AuthContext) -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
            registry: WatchRegistry::new(),
            policy,
            auth,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate losing the connection: every call fails with a store error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn active_watches(&self) -> usize {
        self.registry.active_count()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_online(&self) -> PortalResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PortalError::Store("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn check(
        &self,
        access: Access,
        collection: &str,
        id: &str,
        existing: Option<&Fields>,
        incoming: Option<&Fields>,
    ) -> PortalResult<()> {
        let caller = self.auth.current();
        let request = AccessRequest {
            caller: caller.as_ref(),
            access,
            collection,
            id,
            existing,
            incoming,
        };
        if self.policy.allows(&request) {
            Ok(())
        } else {
            Err(PortalError::PermissionDenied(format!("{}/{}", collection, id)))
        }
    }

    fn collect(data: &Collections, query: &Query) -> Vec<Document> {
        let candidates = data
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        query.apply(candidates)
    }

    /// Re-run every live query that reads a touched collection. Called with
    /// the data lock held so deliveries follow commit order.
    fn notify(&self, data: &Collections, touched: &BTreeSet<String>) {
        for (subscription_id, query) in self.registry.interested(touched) {
            self.registry
                .deliver(&subscription_id, Self::collect(data, &query));
        }
    }

    /// Validate one operation against the current state
    fn check_op(&self, data: &Collections, op: &WriteOp) -> PortalResult<()> {
        let existing = data.get(op.collection()).and_then(|c| c.get(op.id()));
        match op {
            WriteOp::Set { data: incoming, .. } => {
                self.check(Access::Write, op.collection(), op.id(), existing, Some(incoming))
            }
            WriteOp::Update { data: incoming, .. } => {
                if existing.is_none() {
                    return Err(PortalError::NotFound(format!(
                        "{}/{}",
                        op.collection(),
                        op.id()
                    )));
                }
                self.check(Access::Write, op.collection(), op.id(), existing, Some(incoming))
            }
            WriteOp::Delete { .. } => {
                self.check(Access::Write, op.collection(), op.id(), existing, None)
            }
        }
    }

    fn apply_op(data: &mut Collections, op: WriteOp) {
        match op {
            WriteOp::Set {
                collection,
                id,
                data: incoming,
                merge,
            } => {
                let docs = data.entry(collection).or_default();
                match docs.get_mut(&id) {
                    Some(existing) if merge => merge_fields(existing, incoming),
                    _ => {
                        docs.insert(id, incoming);
                    }
                }
            }
            WriteOp::Update {
                collection,
                id,
                data: incoming,
            } => {
                if let Some(existing) = data.get_mut(&collection).and_then(|c| c.get_mut(&id)) {
                    merge_fields(existing, incoming);
                }
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = data.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }

    fn write(&self, ops: Vec<WriteOp>) -> PortalResult<()> {
        self.ensure_online()?;
        let mut data = self.lock();

        for op in &ops {
            self.check_op(&data, op)?;
        }

        let touched: BTreeSet<String> = ops.iter().map(|op| op.collection().to_string()).collect();
        for op in ops {
            Self::apply_op(&mut data, op);
        }

        self.notify(&data, &touched);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> PortalResult<Option<Document>> {
        self.ensure_online()?;
        let data = self.lock();
        let existing = data.get(collection).and_then(|c| c.get(id));
        self.check(Access::Read, collection, id, existing, None)?;
        Ok(existing.map(|fields| Document::new(id, fields.clone())))
    }

    async fn set(&self, collection: &str, id: &str, data: Fields, merge: bool) -> PortalResult<()> {
        self.write(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            merge,
        }])
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> PortalResult<()> {
        self.write(vec![WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        }])
    }

    async fn add(&self, collection: &str, data: Fields) -> PortalResult<String> {
        let id = generate_id(EntityPrefix::for_collection(collection));
        self.write(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.clone(),
            data,
            merge: false,
        }])?;
        debug!(collection = %collection, id = %id, "Document added");
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &str) -> PortalResult<()> {
        self.write(vec![WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }])
    }

    async fn query(&self, query: &Query) -> PortalResult<Vec<Document>> {
        self.ensure_online()?;
        let data = self.lock();
        let docs = Self::collect(&data, query);
        for doc in &docs {
            self.check(Access::Read, &query.collection, &doc.id, Some(&doc.data), None)?;
        }
        Ok(docs)
    }

    async fn watch(&self, query: Query) -> PortalResult<Subscription> {
        self.ensure_online()?;
        let data = self.lock();
        let docs = Self::collect(&data, &query);
        for doc in &docs {
            self.check(Access::Read, &query.collection, &doc.id, Some(&doc.data), None)?;
        }
        // Registered under the data lock so no write slips in between
        Ok(self.registry.register(query, docs))
    }

    async fn commit(&self, batch: WriteBatch) -> PortalResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(batch.ops().to_vec())
    }
}
