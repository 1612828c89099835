use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{Invoice, InvoiceStatus, IssueInvoiceRequest};
use super::validators::IssueInvoiceValidator;
use crate::common::{PortalError, PortalResult, Validator};
use crate::notifications::{NewNotification, NotificationDispatcher, NotificationKind, SenderInfo};
use crate::session::models::User;
use crate::store::{fields, to_fields, DocumentStore, DocumentStoreExt, Query};

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn DocumentStore>,
    dispatcher: NotificationDispatcher,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn issue_invoice(
        &self,
        issuer: &User,
        request: IssueInvoiceRequest,
    ) -> PortalResult<Invoice> {
        IssueInvoiceValidator.validate(&request).into_result()?;
        if request.client_id == issuer.id {
            return Err(PortalError::Validation(
                "Cannot invoice yourself".to_string(),
            ));
        }

        let mut invoice = Invoice {
            id: String::new(),
            project_id: request.project_id,
            issuer_id: issuer.id.clone(),
            client_id: request.client_id,
            amount: request.amount,
            description: request.description.trim().to_string(),
            status: InvoiceStatus::Pending,
            due_date: request.due_date,
            paid_at: None,
            created_at: Utc::now(),
        };
        invoice.id = self.store.add("invoices", to_fields(&invoice)?).await?;

        info!(
            invoice_id = %invoice.id,
            issuer_id = %issuer.id,
            client_id = %invoice.client_id,
            amount = invoice.amount,
            "Invoice issued"
        );

        self.dispatcher
            .notify(
                NewNotification::new(
                    invoice.client_id.as_str(),
                    NotificationKind::Invoice,
                    "New invoice",
                    format!("{} sent you an invoice for ${:.2}", issuer.display_name, invoice.amount),
                )
                .link(format!("/invoices/{}", invoice.id))
                .sender(SenderInfo {
                    id: issuer.id.clone(),
                    name: Some(issuer.display_name.clone()),
                    avatar_url: issuer.avatar_url.clone(),
                }),
            )
            .await;

        Ok(invoice)
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> PortalResult<Invoice> {
        self.store
            .get_as::<Invoice>("invoices", invoice_id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("invoices/{}", invoice_id)))
    }

    /// Record payment by the invoiced client and tell the issuer
    pub async fn mark_invoice_paid(&self, client: &User, invoice_id: &str) -> PortalResult<Invoice> {
        let mut invoice = self.get_invoice(invoice_id).await?;

        if invoice.client_id != client.id && !client.is_admin() {
            return Err(PortalError::PermissionDenied(format!(
                "invoices/{}",
                invoice_id
            )));
        }
        if invoice.status == InvoiceStatus::Paid {
            return Err(PortalError::Conflict(format!(
                "invoice {} is already paid",
                invoice_id
            )));
        }

        let paid_at = Utc::now();
        self.store
            .update(
                "invoices",
                invoice_id,
                fields(json!({"status": "paid", "paid_at": paid_at.to_rfc3339()})),
            )
            .await?;
        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(paid_at);

        info!(invoice_id = %invoice_id, client_id = %client.id, "Invoice paid");

        self.dispatcher
            .notify(
                NewNotification::new(
                    invoice.issuer_id.as_str(),
                    NotificationKind::Success,
                    "Invoice paid",
                    format!("{} paid ${:.2}", client.display_name, invoice.amount),
                )
                .link(format!("/invoices/{}", invoice.id)),
            )
            .await;

        Ok(invoice)
    }

    /// Invoices a user issued or received, newest first
    pub async fn list_invoices(&self, user_id: &str) -> PortalResult<Vec<Invoice>> {
        let issued = Query::new("invoices").where_eq("issuer_id", user_id);
        let received = Query::new("invoices").where_eq("client_id", user_id);
        let (mut docs, incoming) =
            futures::try_join!(self.store.query(&issued), self.store.query(&received))?;
        docs.extend(incoming);

        let mut invoices: Vec<Invoice> = docs
            .iter()
            .filter_map(|doc| match doc.decode::<Invoice>() {
                Ok(invoice) => Some(invoice),
                Err(e) => {
                    warn!(invoice_id = %doc.id, error = %e, "Skipping malformed invoice");
                    None
                }
            })
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        invoices.dedup_by(|a, b| a.id == b.id);
        Ok(invoices)
    }
}
