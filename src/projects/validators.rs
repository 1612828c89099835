// src/projects/validators.rs

use super::models::*;
use crate::common::{check_text, ValidationResult, Validator};

// ============================================================================
// Project Validators
// ============================================================================

pub struct CreateProjectValidator;

impl Validator<CreateProjectRequest> for CreateProjectValidator {
    fn validate(&self, data: &CreateProjectRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        check_text(&mut result, "title", &data.title, 200);
        check_text(&mut result, "description", &data.description, 5000);

        if !data.budget.is_finite() || data.budget < 0.0 {
            result.add_error("budget", "Budget must be a positive amount");
        }

        if data.tags.len() > 20 {
            result.add_error("tags", "A project can have at most 20 tags");
        }
        if data.tags.iter().any(|tag| tag.trim().is_empty() || tag.len() > 50) {
            result.add_error("tags", "Tags must be between 1 and 50 characters");
        }

        if let (Some(start), Some(due)) = (data.start_date, data.due_date) {
            if due < start {
                result.add_error("due_date", "Due date must be after start date");
            }
        }

        result
    }
}

pub struct ApplyValidator;

impl Validator<ApplyRequest> for ApplyValidator {
    fn validate(&self, data: &ApplyRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.project_id.trim().is_empty() {
            result.add_error("project_id", "project_id is required");
        }

        if !data.bid.is_finite() || data.bid <= 0.0 {
            result.add_error("bid", "Bid must be greater than zero");
        }

        check_text(&mut result, "message", &data.message, 5000);

        result
    }
}
