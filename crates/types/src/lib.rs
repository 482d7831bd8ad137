//! Shared data model for the navbar admin editor.
//!
//! - [`MenuTree`] / [`ToolEntry`]: the project's tool menu in canonical order
//! - [`GroupingThreshold`]: validated `1..=10` grouping limit
//! - [`DisplayMode`]: client-side normal/admin view switch
//! - [`NavError`] / [`ValidationError`]: the error taxonomy
//! - [`Notification`]: messages surfaced to the host page

pub mod errors;
pub mod menu;
pub mod notification;
pub mod snapshot;

pub use errors::{Concern, NavError, ValidationError};
pub use menu::{ADMIN_MOUNT_POINT, Bucket, GroupingThreshold, MenuTree, SiblingBuckets, ToolEntry, canonicalize};
pub use notification::Notification;
pub use snapshot::slugify;

/// Which navbar view is shown. Held client-side only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    #[default]
    Normal,
    Admin,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Normal => DisplayMode::Admin,
            DisplayMode::Admin => DisplayMode::Normal,
        }
    }

    pub fn is_admin(self) -> bool {
        self == DisplayMode::Admin
    }
}
