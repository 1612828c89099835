// Common module - shared types and utilities across all modules

pub mod config;
pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod state;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::{AgentCredentials, PortalConfig};
pub use error::{PortalError, PortalResult};
pub use helpers::safe_email_log;
pub use id_generator::*;
pub use state::PortalState;
pub use validation::{check_text, ValidationError, ValidationResult, Validator};
