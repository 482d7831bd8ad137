//! Error taxonomy for the navbar editor.
//!
//! Recoverable errors ([`ValidationError`], [`NavError::PersistFailed`]) are
//! reported through the notification channel and never tear the editor down.
//! [`NavError::SnapshotMalformed`] is fatal for the current render and must be
//! propagated to the host.

use std::fmt;

use thiserror::Error;

/// Which persistence concern a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    /// `POST admin/mount_order`
    Order,
    /// `POST admin/configure_tool_grouping`
    Threshold,
    /// `GET _nav.json`
    Refresh,
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Concern::Order => "tool order",
            Concern::Threshold => "grouping threshold",
            Concern::Refresh => "navigation refresh",
        };
        f.write_str(label)
    }
}

/// Top-level error type for editor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Error saving {concern}: {reason}")]
    PersistFailed { concern: Concern, reason: String },

    #[error("Malformed navigation snapshot: {reason}")]
    SnapshotMalformed { reason: String },
}

/// Errors raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No orderable tool with mount point '{mount_point}'")]
    NotFound { mount_point: String },

    #[error("Invalid drop target: {reason}")]
    InvalidDrop { reason: String },

    #[error("Grouping threshold must be between 1 and 10, got {value}")]
    InvalidThreshold { value: i64 },

    #[error("Tools can only be rearranged in admin mode")]
    NotInAdminMode,
}

impl NavError {
    /// Create a persistence failure for the given concern.
    pub fn persist_failed(concern: Concern, reason: impl Into<String>) -> Self {
        Self::PersistFailed {
            concern,
            reason: reason.into(),
        }
    }

    /// Create a malformed snapshot error.
    pub fn snapshot_malformed(reason: impl Into<String>) -> Self {
        Self::SnapshotMalformed { reason: reason.into() }
    }

    /// Whether the editor can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, NavError::SnapshotMalformed { .. })
    }
}

impl ValidationError {
    /// Create a not found error.
    pub fn not_found(mount_point: impl Into<String>) -> Self {
        Self::NotFound {
            mount_point: mount_point.into(),
        }
    }

    /// Create an invalid drop error.
    pub fn invalid_drop(reason: impl Into<String>) -> Self {
        Self::InvalidDrop { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert_into_nav_error() {
        let err: NavError = ValidationError::not_found("wiki").into();
        assert!(matches!(err, NavError::Validation(ValidationError::NotFound { .. })));
        assert!(err.is_recoverable());
    }

    #[test]
    fn malformed_snapshot_is_not_recoverable() {
        let err = NavError::snapshot_malformed("missing `menu` field");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Malformed navigation snapshot: missing `menu` field");
    }

    #[test]
    fn persist_failed_names_the_concern() {
        let err = NavError::persist_failed(Concern::Order, "HTTP 500");
        assert_eq!(err.to_string(), "Error saving tool order: HTTP 500");
    }
}
