//! Input normalization and validation.

use validator::{ValidateEmail, ValidationError};

use crate::crypto::INVITE_CODE_LEN;

lazy_static::lazy_static! {
    static ref INVITE_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9]{6,64}$").unwrap();
}

/// Canonical form of an invite code: trimmed and lowercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Canonical form of an email address: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates the shape of a (normalized) invite code.
///
/// Generated codes are `INVITE_CODE_LEN` characters; older shorter codes are still accepted.
pub fn validate_invite_code(code: &str) -> Result<(), ValidationError> {
    if INVITE_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invite_code_format");
        err.message = Some(
            format!(
                "Invite code must be alphanumeric (generated codes are {} characters)",
                INVITE_CODE_LEN
            )
            .into(),
        );
        Err(err)
    }
}

/// Validates an email address after normalization.
pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if normalize_email(email).validate_email() {
        Ok(())
    } else {
        let mut err = ValidationError::new("email");
        err.message = Some("Invalid email format".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  AbC123xyz "), "abc123xyz");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Guest@Example.COM"), "guest@example.com");
    }

    #[test]
    fn test_validate_invite_code() {
        assert!(validate_invite_code("abcdefghjkmn").is_ok());
        assert!(validate_invite_code("abc").is_err());
        assert!(validate_invite_code("abc-def-ghj").is_err());
        assert!(validate_invite_code("ABCDEFGHJKMN").is_err());
    }

    #[test]
    fn test_validate_invite_code_error_message() {
        let err = validate_invite_code("!").unwrap_err();
        assert_eq!(err.code, "invite_code_format");
        assert!(err.message.unwrap().contains("alphanumeric"));
    }

    #[test]
    fn test_validate_email_address() {
        assert!(validate_email_address("guest@example.com").is_ok());
        assert!(validate_email_address(" Guest@Example.com ").is_ok());
        assert!(validate_email_address("not-an-email").is_err());
        assert!(validate_email_address("").is_err());
    }
}
