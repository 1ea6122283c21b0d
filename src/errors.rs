/*!
 * Error Types
 * Container errors with thiserror, miette, and serde support
 *
 * "Empty" and "not found" are ordinary `None` results and never show up here.
 * Only fallible construction and timed waits report through these types.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for fallible container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Container errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ContainerError {
    #[error("Sharded map requires at least one bucket")]
    #[diagnostic(
        code(sharded_map::zero_capacity),
        help("Pick the bucket count up front from the expected load; the table never resizes.")
    )]
    ZeroCapacity,

    #[error("Timed out after {0:?} waiting for queue data")]
    #[diagnostic(
        code(two_lock_queue::timeout),
        help("No producer pushed within the deadline. Retry or use the blocking wait.")
    )]
    Timeout(Duration),
}

impl ContainerError {
    /// Check if this error is a wait timeout
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ContainerError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ContainerError::ZeroCapacity.to_string(),
            "Sharded map requires at least one bucket"
        );
        let err = ContainerError::Timeout(Duration::from_millis(5));
        assert!(err.to_string().contains("5ms"));
        assert!(err.is_timeout());
        assert!(!ContainerError::ZeroCapacity.is_timeout());
    }

    #[test]
    fn test_diagnostic_code() {
        let code = ContainerError::ZeroCapacity.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("sharded_map::zero_capacity"));
    }
}
