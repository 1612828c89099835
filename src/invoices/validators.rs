// src/invoices/validators.rs

use super::models::*;
use crate::common::{ValidationResult, Validator};

pub struct IssueInvoiceValidator;

impl Validator<IssueInvoiceRequest> for IssueInvoiceValidator {
    fn validate(&self, data: &IssueInvoiceRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.project_id.trim().is_empty() {
            result.add_error("project_id", "project_id is required");
        }
        if data.client_id.trim().is_empty() {
            result.add_error("client_id", "client_id is required");
        }
        if !data.amount.is_finite() || data.amount <= 0.0 {
            result.add_error("amount", "Amount must be greater than zero");
        }
        if data.description.len() > 1000 {
            result.add_error("description", "description must be less than 1000 characters");
        }

        result
    }
}
