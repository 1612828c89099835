use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::common::helpers::normalize_timestamp;
use crate::common::{PortalError, PortalResult};

/// Field map of a stored document
pub type Fields = Map<String, Value>;

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Looks up a field; dotted paths descend into nested objects
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.data, path)
    }

    /// Deserializes the document into a typed model, exposing the document id
    /// as an `id` field
    pub fn decode<T: DeserializeOwned>(&self) -> PortalResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Serializes a model into document fields; the `id` key is dropped because
/// ids live beside the data, not inside it.
pub fn to_fields<T: Serialize>(value: &T) -> PortalResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(PortalError::Store(format!(
            "expected an object document, got {}",
            other
        ))),
    }
}

/// Builds a field map from `json!` object literals
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let field = doc.get(&self.field);
        match self.op {
            FilterOp::Eq => field == Some(&self.value),
            FilterOp::Ne => field.is_some() && field != Some(&self.value),
            FilterOp::Lt => field.is_some() && compare_values(field, Some(&self.value)).is_lt(),
            FilterOp::Lte => field.is_some() && compare_values(field, Some(&self.value)).is_le(),
            FilterOp::Gt => compare_values(field, Some(&self.value)).is_gt(),
            FilterOp::Gte => field.is_some() && compare_values(field, Some(&self.value)).is_ge(),
            FilterOp::In => match (&self.value, field) {
                (Value::Array(options), Some(v)) => options.contains(v),
                _ => false,
            },
            FilterOp::ArrayContains => match field {
                Some(Value::Array(items)) => items.contains(&self.value),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A filtered, ordered and optionally limited read over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Runs the query over an unordered candidate set
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut result: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        match &self.order_by {
            Some(order) => result.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.field), b.get(&order.field));
                let ordering = match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            }),
            None => result.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}

/// Total order over JSON values used by filters and ordering
///
/// Missing values sort first. Strings that both parse as timestamps compare
/// chronologically, since RFC 3339 strings with differing fractional digits
/// do not sort lexicographically. Values of different JSON types that both
/// read as timestamps compare chronologically too.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => {
                match (normalize_timestamp(a), normalize_timestamp(b)) {
                    (Some(tx), Some(ty)) => tx.cmp(&ty),
                    _ => x.cmp(y),
                }
            }
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            // Mixed timestamp encodings (millis, RFC 3339, {seconds, nanoseconds})
            _ => match (normalize_timestamp(a), normalize_timestamp(b)) {
                (Some(tx), Some(ty)) => tx.cmp(&ty),
                _ => type_rank(a).cmp(&type_rank(b)),
            },
        },
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

// ============================================================================
// Live query snapshots
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub doc: Document,
}

/// One delivery of a live query: the full current result set plus the
/// changes since the previous delivery
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub docs: Vec<Document>,
    pub changes: Vec<DocumentChange>,
    /// True for the first delivery after subscribing
    pub initial: bool,
}

impl Snapshot {
    pub fn added(&self) -> impl Iterator<Item = &Document> {
        self.changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Added)
            .map(|c| &c.doc)
    }
}

/// Computes the change list between two result sets, keyed by document id
pub fn diff(previous: &[Document], current: &[Document]) -> Vec<DocumentChange> {
    let mut changes = Vec::new();

    for doc in current {
        match previous.iter().find(|p| p.id == doc.id) {
            None => changes.push(DocumentChange {
                kind: ChangeKind::Added,
                doc: doc.clone(),
            }),
            Some(old) if old.data != doc.data => changes.push(DocumentChange {
                kind: ChangeKind::Modified,
                doc: doc.clone(),
            }),
            Some(_) => {}
        }
    }

    for old in previous {
        if !current.iter().any(|d| d.id == old.id) {
            changes.push(DocumentChange {
                kind: ChangeKind::Removed,
                doc: old.clone(),
            });
        }
    }

    changes
}

// ============================================================================
// Batched writes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Fields,
        merge: bool,
    },
    Update {
        collection: String,
        id: String,
        data: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Set { id, .. } | WriteOp::Update { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// A set of writes committed atomically: either every operation applies or
/// none does
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Fields, merge: bool) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            merge,
        });
        self
    }

    pub fn update(&mut self, collection: &str, id: &str, data: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn collections(&self) -> BTreeSet<String> {
        self.ops.iter().map(|op| op.collection().to_string()).collect()
    }
}

/// Shallow merge used by `set(merge = true)` and `update`
pub fn merge_fields(target: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}
