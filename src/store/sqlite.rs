use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::migrations::run_migrations;
use super::models::{merge_fields, Document, Fields, FilterOp, Query, WriteBatch, WriteOp};
use super::rules::{Access, AccessPolicy, AccessRequest, AllowAll};
use super::watch::{Subscription, WatchRegistry};
use super::DocumentStore;
use crate::common::id_generator::{generate_id, EntityPrefix};
use crate::common::{PortalError, PortalResult};
use crate::identity::models::AuthContext;

/// Document store persisted as JSON rows in SQLite
///
/// Every write runs inside one transaction and, once committed, re-runs
/// the live queries that read the touched collections. Writes are
/// serialized so snapshots are delivered in commit order.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    registry: WatchRegistry,
    policy: Arc<dyn AccessPolicy>,
    auth: AuthContext,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            registry: WatchRegistry::new(),
            policy: Arc::new(AllowAll),
            auth: AuthContext::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_rules(mut self, policy: Arc<dyn AccessPolicy>, auth: AuthContext) -> Self {
        self.policy = policy;
        self.auth = auth;
        self
    }

    /// Open (and create if missing) the database at `database_url` and run
    /// the schema migrations
    pub async fn connect(database_url: &str, reset: bool) -> PortalResult<Self> {
        if let Some(path_part) = database_url.strip_prefix("sqlite://") {
            let path_without_params = path_part.split('?').next().unwrap_or("");
            if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
                let db_path = PathBuf::from(path_without_params);
                if let Some(parent) = db_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await.map_err(|e| {
                            PortalError::Store(format!("cannot create database directory: {}", e))
                        })?;
                    }
                }
            }
        }

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // An in-memory database exists per connection, so keep exactly one
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;

        run_migrations(&pool, reset).await?;
        info!(database_url = %database_url, "SQLite document store ready");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
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

    fn parse(raw: &str) -> PortalResult<Fields> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            other => Err(PortalError::Store(format!(
                "stored document is not an object: {}",
                other
            ))),
        }
    }

    async fn load(
        conn: &mut SqliteConnection,
        collection: &str,
        id: &str,
    ) -> PortalResult<Option<Fields>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT data FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|(raw,)| Self::parse(&raw)).transpose()
    }

    /// Equality filters on string values are pushed into SQL; every filter is
    /// then re-applied in memory together with ordering and the limit.
    async fn fetch(conn: &mut SqliteConnection, query: &Query) -> PortalResult<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut pushed: Vec<(String, String)> = Vec::new();
        for filter in &query.filters {
            if let (FilterOp::Eq, Value::String(value)) = (filter.op, &filter.value) {
                sql.push_str(" AND json_extract(data, ?) = ?");
                pushed.push((format!("$.{}", filter.field), value.clone()));
            }
        }

        let mut statement = sqlx::query_as::<_, (String, String)>(&sql).bind(query.collection.as_str());
        for (path, value) in pushed {
            statement = statement.bind(path).bind(value);
        }
        let rows = statement.fetch_all(&mut *conn).await?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
            match Self::parse(&raw) {
                Ok(data) => docs.push(Document::new(id, data)),
                Err(e) => warn!(
                    collection = %query.collection,
                    id = %id,
                    error = %e,
                    "Skipping unreadable document"
                ),
            }
        }
        Ok(query.apply(docs))
    }

    async fn upsert(
        conn: &mut SqliteConnection,
        collection: &str,
        id: &str,
        data: &Fields,
    ) -> PortalResult<()> {
        let raw = serde_json::to_string(data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                data = excluded.data,
                updated_at = datetime('now')
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(raw)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn apply_op(&self, conn: &mut SqliteConnection, op: WriteOp) -> PortalResult<()> {
        let existing = Self::load(conn, op.collection(), op.id()).await?;

        match op {
            WriteOp::Set {
                collection,
                id,
                data,
                merge,
            } => {
                self.check(Access::Write, &collection, &id, existing.as_ref(), Some(&data))?;
                let merged = match existing {
                    Some(mut current) if merge => {
                        merge_fields(&mut current, data);
                        current
                    }
                    _ => data,
                };
                Self::upsert(conn, &collection, &id, &merged).await
            }
            WriteOp::Update {
                collection,
                id,
                data,
            } => {
                let Some(mut current) = existing else {
                    return Err(PortalError::NotFound(format!("{}/{}", collection, id)));
                };
                self.check(Access::Write, &collection, &id, Some(&current), Some(&data))?;
                merge_fields(&mut current, data);
                Self::upsert(conn, &collection, &id, &current).await
            }
            WriteOp::Delete { collection, id } => {
                self.check(Access::Write, &collection, &id, existing.as_ref(), None)?;
                sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                    .bind(&collection)
                    .bind(&id)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
        }
    }

    async fn write(&self, ops: Vec<WriteOp>) -> PortalResult<()> {
        let _guard = self.write_lock.lock().await;
        let touched: BTreeSet<String> = ops.iter().map(|op| op.collection().to_string()).collect();

        // Dropping the transaction on error rolls every operation back
        let mut tx = self.pool.begin().await?;
        for op in ops {
            self.apply_op(&mut tx, op).await?;
        }
        tx.commit().await?;

        self.notify(&touched).await;
        Ok(())
    }

    async fn notify(&self, touched: &BTreeSet<String>) {
        let watchers = self.registry.interested(touched);
        if watchers.is_empty() {
            return;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Cannot refresh live queries");
                return;
            }
        };

        for (subscription_id, query) in watchers {
            match Self::fetch(&mut conn, &query).await {
                Ok(docs) => self.registry.deliver(&subscription_id, docs),
                Err(e) => warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to refresh live query"
                ),
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> PortalResult<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        let existing = Self::load(&mut conn, collection, id).await?;
        self.check(Access::Read, collection, id, existing.as_ref(), None)?;
        Ok(existing.map(|data| Document::new(id, data)))
    }

    async fn set(&self, collection: &str, id: &str, data: Fields, merge: bool) -> PortalResult<()> {
        self.write(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            merge,
        }])
        .await
    }

    async fn update(&self, collection: &str, id: &str, data: Fields) -> PortalResult<()> {
        self.write(vec![WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        }])
        .await
    }

    async fn add(&self, collection: &str, data: Fields) -> PortalResult<String> {
        let id = generate_id(EntityPrefix::for_collection(collection));
        self.write(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.clone(),
            data,
            merge: false,
        }])
        .await?;
        debug!(collection = %collection, id = %id, "Document added");
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &str) -> PortalResult<()> {
        self.write(vec![WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }])
        .await
    }

    async fn query(&self, query: &Query) -> PortalResult<Vec<Document>> {
        let mut conn = self.pool.acquire().await?;
        let docs = Self::fetch(&mut conn, query).await?;
        for doc in &docs {
            self.check(Access::Read, &query.collection, &doc.id, Some(&doc.data), None)?;
        }
        Ok(docs)
    }

    async fn watch(&self, query: Query) -> PortalResult<Subscription> {
        // Hold the write lock so no commit lands between the read and the
        // registration
        let _guard = self.write_lock.lock().await;
        let docs = {
            let mut conn = self.pool.acquire().await?;
            Self::fetch(&mut conn, &query).await?
        };
        for doc in &docs {
            self.check(Access::Read, &query.collection, &doc.id, Some(&doc.data), None)?;
        }
        Ok(self.registry.register(query, docs))
    }

    async fn commit(&self, batch: WriteBatch) -> PortalResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(batch.ops().to_vec()).await
    }
}
