// src/profile/validators.rs

use super::models::*;
use crate::common::{check_text, ValidationResult, Validator};

// ============================================================================
// Profile Validators
// ============================================================================

const MAX_LIST_ITEMS: usize = 50;

pub struct UpdateProfileValidator;

impl Validator<UpdateProfileRequest> for UpdateProfileValidator {
    fn validate(&self, data: &UpdateProfileRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(display_name) = &data.display_name {
            check_text(&mut result, "display_name", display_name, 100);
        }

        if let Some(bio) = &data.bio {
            if bio.len() > 2000 {
                result.add_error("bio", "bio must be less than 2000 characters");
            }
        }

        for (field, value) in [
            ("company", &data.company),
            ("location", &data.location),
        ] {
            if let Some(value) = value {
                if value.len() > 255 {
                    result.add_error(field, &format!("{} must be less than 255 characters", field));
                }
            }
        }

        if let Some(avatar_url) = &data.avatar_url {
            if !avatar_url.is_empty() && !is_web_url(avatar_url) {
                result.add_error(
                    "avatar_url",
                    "Avatar must be a valid URL starting with http:// or https://",
                );
            }
        }

        if let Some(rate) = data.hourly_rate {
            if !rate.is_finite() || rate < 0.0 {
                result.add_error("hourly_rate", "Hourly rate must be a positive number");
            }
        }

        if let Some(skills) = &data.skills {
            if skills.len() > MAX_LIST_ITEMS {
                result.add_error("skills", "Too many skills");
            }
            if skills.iter().any(|s| s.trim().is_empty()) {
                result.add_error("skills", "Skills cannot be empty");
            }
        }

        for (field, links) in [
            ("portfolio", &data.portfolio),
            ("contact_links", &data.contact_links),
        ] {
            if let Some(links) = links {
                if links.len() > MAX_LIST_ITEMS {
                    result.add_error(field, &format!("Too many {} entries", field));
                }
                if links.iter().any(|link| !is_web_url(link) && !link.starts_with("mailto:")) {
                    result.add_error(field, "Links must start with http://, https:// or mailto:");
                }
            }
        }

        result
    }
}

fn is_web_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
