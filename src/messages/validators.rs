use crate::common::{PortalError, PortalResult};

pub const MAX_MESSAGE_LENGTH: usize = 10000;

/// Validate message content
pub fn validate_message_content(content: &str) -> PortalResult<()> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(PortalError::Validation(
            "Message cannot be empty".to_string(),
        ));
    }

    if trimmed.len() > MAX_MESSAGE_LENGTH {
        return Err(PortalError::Validation(format!(
            "Message exceeds maximum length of {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }

    Ok(())
}

/// Short preview used in notification bodies
pub fn preview(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
