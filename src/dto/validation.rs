//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest identifier accepted for sessions and participants.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates an opaque chat identifier (guild or user id).
///
/// # Examples
///
/// ```ignore
/// validate_identifier("112233445566") // Ok
/// validate_identifier("")             // Err - empty
/// validate_identifier("a b")          // Err - whitespace
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("Identifier must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_chat_ids() {
        assert!(validate_identifier("112233445566").is_ok());
        assert!(validate_identifier("U1").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"9".repeat(65)).is_err());
    }

    #[test]
    fn rejects_whitespace() {
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier(" U1").is_err());
    }
}
