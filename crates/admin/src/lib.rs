//! Admin-mode navbar editor.
//!
//! [`AdminController`] ties the pieces together: it holds the live menu tree,
//! switches between normal and admin display, feeds drag-drop releases through
//! the reorder engine, and persists the result through the API client while
//! keeping local state optimistically in sync.
//!
//! # Usage
//!
//! ```ignore
//! use navbar_admin::AdminController;
//! use navbar_api::{HttpTransport, NavConfig};
//! use navbar_engine::DropEvent;
//!
//! let transport = HttpTransport::new(NavConfig::from_env()?)?;
//! let (mut controller, mut notifications) = AdminController::mount(transport).await?;
//! controller.toggle_admin();
//! controller.drop_tool(&DropEvent::reorder("tickets", 2, 0))?;
//! // In your event loop, poll controller.next_update() alongside input and
//! // drain notifications into the page's message area.
//! ```

mod controller;

pub use controller::{AdminController, ControllerState, ControllerUpdate};
