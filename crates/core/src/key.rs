//! Key validation for the flat store namespace
//!
//! User-facing keys are plain Unicode text with two reserved characters:
//! `/` delimits derived field keys and `,` delimits array-valued entries.
//! Both are rejected at DSL time; derived keys (`K/field`, `K/$fields`,
//! `K/<idx>/$addresses`, ...) are built internally and legitimately contain
//! the field delimiter.

use thiserror::Error;

/// Field delimiter, reserved in user keys.
pub const FIELD_DELIMITER: char = '/';

/// Array delimiter, reserved in user keys.
pub const ARRAY_DELIMITER: char = ',';

/// Validate a user-supplied key, field name, index name, or address.
///
/// # Examples
///
/// ```
/// use trellis_core::key::validate_user_key;
///
/// assert!(validate_user_key("account-7").is_ok());
/// assert!(validate_user_key("").is_err());
/// assert!(validate_user_key("a/b").is_err());
/// assert!(validate_user_key("a,b").is_err());
/// ```
pub fn validate_user_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.contains(FIELD_DELIMITER) {
        return Err(KeyError::ReservedChar {
            ch: FIELD_DELIMITER,
        });
    }
    if key.contains(ARRAY_DELIMITER) {
        return Err(KeyError::ReservedChar {
            ch: ARRAY_DELIMITER,
        });
    }
    Ok(())
}

/// Key validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Key is empty
    #[error("key cannot be empty")]
    Empty,

    /// Key contains a reserved delimiter
    #[error("key cannot contain reserved character '{ch}'")]
    ReservedChar {
        /// The offending character
        ch: char,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_user_key("x").is_ok());
        assert!(validate_user_key("user:123").is_ok());
        assert!(validate_user_key("日本語").is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(validate_user_key(""), Err(KeyError::Empty));
    }

    #[test]
    fn test_reserved_chars_rejected() {
        assert_eq!(
            validate_user_key("a/b"),
            Err(KeyError::ReservedChar { ch: '/' })
        );
        assert_eq!(
            validate_user_key("a,b"),
            Err(KeyError::ReservedChar { ch: ',' })
        );
    }
}
