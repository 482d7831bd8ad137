//! User-facing notifications emitted by the editor.

use std::fmt;

use crate::errors::{Concern, ValidationError};

/// A transient message for the host page to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The server accepted a new tool order.
    OrderSaved,
    /// A submission failed; the optimistic local state was kept.
    PersistFailed { concern: Concern, reason: String },
    /// An action was rejected before any network call.
    Rejected { reason: String },
}

impl Notification {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notification::OrderSaved)
    }
}

impl From<&ValidationError> for Notification {
    fn from(error: &ValidationError) -> Self {
        Notification::Rejected {
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::OrderSaved => f.write_str("Tool order updated"),
            Notification::PersistFailed { concern, .. } => write!(f, "Error saving {concern}."),
            Notification::Rejected { reason } => f.write_str(reason),
        }
    }
}
