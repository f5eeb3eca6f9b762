// Validation utilities for request fields

/// Browser session ids are client-generated; keep them short and key-safe
pub const SESSION_ID_MAX_LEN: usize = 128;

/// Trim a string field, rejecting it when required and empty
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        Err("Field cannot be empty".to_string())
    } else {
        Ok(trimmed)
    }
}

/// `None` when the field is absent or blank after trimming
pub fn trim_optional_field(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Session ids end up in storage keys, so only a conservative alphabet is accepted
pub fn validate_session_id(session_id: &str) -> Result<String, String> {
    let trimmed = trim_and_validate_field(session_id, true)
        .map_err(|_| "Session id is required".to_string())?;

    if trimmed.len() > SESSION_ID_MAX_LEN {
        return Err(format!(
            "Session id must be at most {} characters",
            SESSION_ID_MAX_LEN
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Session id contains invalid characters".to_string());
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_fields() {
        assert_eq!(trim_and_validate_field("  hi ", true), Ok("hi".to_string()));
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false), Ok(String::new()));
        assert_eq!(trim_optional_field(Some("  ")), None);
        assert_eq!(trim_optional_field(Some(" funny ")), Some("funny".to_string()));
    }

    #[test]
    fn test_session_id() {
        assert_eq!(
            validate_session_id(" 3f2a-b_9 "),
            Ok("3f2a-b_9".to_string())
        );
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("a:b").is_err());
        assert!(validate_session_id(&"x".repeat(SESSION_ID_MAX_LEN + 1)).is_err());
    }
}
