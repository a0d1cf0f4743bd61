//! Input validation utilities

use thiserror::Error;

pub const MAX_PATTERN_LENGTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternValidationError {
    #[error("Pattern is required and cannot be empty")]
    Required,

    #[error("Pattern must be at most {0} characters")]
    TooLong(usize),

    #[error("Pattern must not contain whitespace: '{0}'")]
    Whitespace(String),
}

/// Checks a path pattern before it is stored as a match rule
pub fn validate_pattern(pattern: &str) -> Result<(), PatternValidationError> {
    if pattern.trim().is_empty() {
        return Err(PatternValidationError::Required);
    }
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(PatternValidationError::TooLong(MAX_PATTERN_LENGTH));
    }
    if pattern.chars().any(char::is_whitespace) {
        return Err(PatternValidationError::Whitespace(pattern.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_patterns() {
        assert!(validate_pattern("/api/**").is_ok());
        assert!(validate_pattern("/apis/{group}/*").is_ok());
        assert!(validate_pattern("*.css").is_ok());
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(validate_pattern(""), Err(PatternValidationError::Required));
        assert_eq!(validate_pattern("   "), Err(PatternValidationError::Required));
        assert!(matches!(
            validate_pattern("/api/ test"),
            Err(PatternValidationError::Whitespace(_))
        ));
        assert_eq!(
            validate_pattern(&"a".repeat(MAX_PATTERN_LENGTH + 1)),
            Err(PatternValidationError::TooLong(MAX_PATTERN_LENGTH))
        );
    }
}
