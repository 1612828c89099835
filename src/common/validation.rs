// Common validation types and traits

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Turn an invalid result into an error, for `?` at call sites
    pub fn into_result(self) -> Result<(), super::PortalError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

/// Checks a required free-text field against a maximum length
pub fn check_text(result: &mut ValidationResult, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        result.add_error(field, &format!("{} is required", field));
    } else if value.len() > max {
        result.add_error(
            field,
            &format!("{} must be less than {} characters", field, max),
        );
    }
}
