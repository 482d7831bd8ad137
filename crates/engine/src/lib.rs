//! # Navbar Engine
//!
//! Pure transforms over the navbar [`MenuTree`](navbar_types::MenuTree):
//!
//! - **`reorder`**: applies a drag-drop release and reassigns ordinals
//! - **`render`**: projects a tree into a normal or admin view tree
//!
//! Neither module mutates its input; both hand back fresh values so the
//! controller stays the only owner of live state.
//!
//! ```rust
//! use navbar_engine::{DropEvent, compute_reorder, render};
//! use navbar_types::{DisplayMode, GroupingThreshold, MenuTree, ToolEntry};
//!
//! let tree = MenuTree::new(
//!     vec![
//!         ToolEntry::new("a", "A", "/p/demo/a/").with_ordinal(0),
//!         ToolEntry::new("b", "B", "/p/demo/b/").with_ordinal(1),
//!     ],
//!     GroupingThreshold::default(),
//! );
//! let next = compute_reorder(&tree, &DropEvent::reorder("b", 1, 0))?;
//! assert_eq!(next.entries()[0].mount_point, "b");
//! let view = render(&next, DisplayMode::Admin);
//! assert_eq!(view.nodes.len(), 2);
//! # Ok::<(), navbar_types::ValidationError>(())
//! ```

pub mod render;
pub mod reorder;

pub use render::{DragHandle, ViewGroup, ViewItem, ViewNode, ViewTree, render, render_at};
pub use reorder::{DropDestination, DropEvent, PointerHalf, PointerTarget, compute_reorder};
