//! Shared utilities and types for feature modules
//!
//! - **pagination**: page parameters and response metadata
//! - **validation**: input validation utilities
//! - **test_helpers**: in-memory state for handler tests (test-only)

pub mod pagination;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;

pub use pagination::{PaginationMetadata, PaginationParams};
pub use validation::{validate_pattern, PatternValidationError};
