// src/invoices/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::helpers::{
    deserialize_amount, deserialize_optional_timestamp, deserialize_timestamp,
};

// ============================================================================
// Invoice Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Overdue,
    #[default]
    #[serde(other)]
    Pending,
}

/// The `invoices/{id}` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub issuer_id: String,
    pub client_id: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Stored status, with unpaid invoices past their due date reported as
    /// overdue
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        match (self.status, self.due_date) {
            (InvoiceStatus::Pending, Some(due)) if due < now => InvoiceStatus::Overdue,
            (status, _) => status,
        }
    }
}

// ============================================================================
// Request Models
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueInvoiceRequest {
    pub project_id: String,
    pub client_id: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}
