use crate::constants::*;

/// A message body may be empty only when it carries an attachment.
pub fn validate_message_content(body: &str, has_attachment: bool) -> Result<(), String> {
    if body.trim().is_empty() && !has_attachment {
        return Err("Message content is required".into());
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_status(status: &str) -> Result<(), String> {
    if USER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(format!("Invalid status: {}", status))
    }
}

/// Tenant keys are DNS labels: lowercase alphanumerics and hyphens.
pub fn validate_tenant_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Tenant key is required".into());
    }
    if key.len() > MAX_TENANT_KEY_LENGTH {
        return Err(format!(
            "Tenant key must be at most {} characters",
            MAX_TENANT_KEY_LENGTH
        ));
    }
    if key.starts_with('-') || key.ends_with('-') {
        return Err("Tenant key cannot start or end with a hyphen".into());
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Tenant key can only contain lowercase letters, numbers, and hyphens".into());
    }
    Ok(())
}
