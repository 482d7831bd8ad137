//! Reorder engine: turns a drag-drop release into a new [`MenuTree`].
//!
//! [`compute_reorder`] is a pure function of the input tree and the event. It
//! clones the entries it needs and never touches the caller's tree, so a
//! renderer holding the old tree keeps seeing a consistent snapshot.

use navbar_types::{MenuTree, SiblingBuckets, ToolEntry, ValidationError};
use tracing::debug;

/// Where a dragged entry lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDestination {
    /// Same sibling list the entry came from (plain reorder).
    Siblings,
    /// Into the children of the entry with this mount point (group nesting).
    Group(String),
    /// Out of any group, into the top-level menu.
    TopLevel,
}

/// Which half of the hovered item the pointer was released over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerHalf {
    Upper,
    Lower,
}

/// Pointer position at release time, relative to the destination's orderable
/// items as they were displayed (before the dragged entry was removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerTarget {
    pub over_index: usize,
    pub half: PointerHalf,
}

impl PointerTarget {
    /// Upper half inserts before the hovered item, lower half after it.
    pub fn insertion_index(&self) -> usize {
        match self.half {
            PointerHalf::Upper => self.over_index,
            PointerHalf::Lower => self.over_index + 1,
        }
    }
}

/// A completed drag.
///
/// `from_index` and `to_index` count orderable entries only; anchored and
/// admin-pinned entries are not part of the draggable list. `to_index` is the
/// insertion point after the entry has been removed from its source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub moved_mount_point: String,
    pub from_index: usize,
    pub to_index: usize,
    pub destination: DropDestination,
}

impl DropEvent {
    pub fn reorder(moved_mount_point: impl Into<String>, from_index: usize, to_index: usize) -> Self {
        Self {
            moved_mount_point: moved_mount_point.into(),
            from_index,
            to_index,
            destination: DropDestination::Siblings,
        }
    }

    pub fn into_group(
        moved_mount_point: impl Into<String>,
        from_index: usize,
        to_index: usize,
        parent_mount_point: impl Into<String>,
    ) -> Self {
        Self {
            moved_mount_point: moved_mount_point.into(),
            from_index,
            to_index,
            destination: DropDestination::Group(parent_mount_point.into()),
        }
    }

    /// Builds an event from the pointer position at release.
    ///
    /// Within the source list the displayed indices still include the dragged
    /// entry, so targets below it shift up by one once it is removed.
    pub fn from_pointer(
        moved_mount_point: impl Into<String>,
        from_index: usize,
        target: PointerTarget,
        destination: DropDestination,
    ) -> Self {
        let raw = target.insertion_index();
        let to_index = if destination == DropDestination::Siblings && from_index < raw {
            raw - 1
        } else {
            raw
        };
        Self {
            moved_mount_point: moved_mount_point.into(),
            from_index,
            to_index,
            destination,
        }
    }
}

/// Computes the tree that results from `event`.
///
/// Every sibling list the move touches gets its orderable ordinals reassigned
/// `0..n` by final position. Anchored and admin-pinned entries keep their
/// place and ordinal.
///
/// # Errors
/// - [`ValidationError::NotFound`] when the moved mount point is absent or
///   not orderable
/// - [`ValidationError::InvalidDrop`] when the destination group is unknown,
///   is the admin tool, or would make the entry its own ancestor
pub fn compute_reorder(tree: &MenuTree, event: &DropEvent) -> Result<MenuTree, ValidationError> {
    let moved_mount_point = event.moved_mount_point.as_str();
    let moved = tree
        .find(moved_mount_point)
        .filter(|entry| entry.is_orderable())
        .ok_or_else(|| ValidationError::not_found(moved_mount_point))?;

    let source_parent = parent_of(tree, moved_mount_point);
    let destination_parent = match &event.destination {
        DropDestination::Siblings => source_parent.clone(),
        DropDestination::TopLevel => None,
        DropDestination::Group(parent) => {
            let group = tree
                .find(parent)
                .ok_or_else(|| ValidationError::invalid_drop(format!("unknown group '{parent}'")))?;
            if group.is_admin_pinned() {
                return Err(ValidationError::invalid_drop("tools cannot be nested under the admin tool"));
            }
            if moved.contains(parent) {
                return Err(ValidationError::invalid_drop(format!(
                    "'{moved_mount_point}' cannot become its own ancestor"
                )));
            }
            Some(parent.clone())
        }
    };

    let mut entries = tree.entries().to_vec();

    let source_list = list_mut(&mut entries, source_parent.as_deref())
        .ok_or_else(|| ValidationError::not_found(moved_mount_point))?;
    let source_position = source_list
        .iter()
        .filter(|entry| entry.is_orderable())
        .position(|entry| entry.mount_point == moved_mount_point);
    if source_position != Some(event.from_index) {
        debug!(
            mount_point = %moved_mount_point,
            reported = event.from_index,
            actual = ?source_position,
            "drag origin index disagrees with tree; using mount point"
        );
    }
    let raw_position = source_list
        .iter()
        .position(|entry| entry.mount_point == moved_mount_point)
        .ok_or_else(|| ValidationError::not_found(moved_mount_point))?;
    let detached = source_list.remove(raw_position);

    let destination_list = list_mut(&mut entries, destination_parent.as_deref())
        .ok_or_else(|| ValidationError::invalid_drop("destination vanished during the move"))?;
    let mut buckets = SiblingBuckets::split(std::mem::take(destination_list));
    let inserted_at = buckets.insert_orderable(event.to_index, detached);
    *destination_list = buckets.into_entries();

    if source_parent != destination_parent
        && let Some(source_list) = list_mut(&mut entries, source_parent.as_deref())
    {
        *source_list = SiblingBuckets::split(std::mem::take(source_list)).into_entries();
    }

    debug!(
        mount_point = %moved_mount_point,
        destination = ?destination_parent,
        index = inserted_at,
        "computed reorder"
    );
    Ok(MenuTree::new(entries, tree.grouping_threshold()))
}

fn parent_of(tree: &MenuTree, mount_point: &str) -> Option<String> {
    let path = tree.path_of(mount_point)?;
    let (_, parents) = path.split_last()?;
    if parents.is_empty() {
        return None;
    }
    let mut list = tree.entries();
    let mut parent = None;
    for index in parents {
        let entry = list.get(*index)?;
        parent = Some(entry.mount_point.clone());
        list = &entry.children;
    }
    parent
}

fn list_mut<'a>(entries: &'a mut Vec<ToolEntry>, parent: Option<&str>) -> Option<&'a mut Vec<ToolEntry>> {
    match parent {
        None => Some(entries),
        Some(mount_point) => find_mut(entries, mount_point).map(|entry| &mut entry.children),
    }
}

fn find_mut<'a>(list: &'a mut [ToolEntry], mount_point: &str) -> Option<&'a mut ToolEntry> {
    for entry in list.iter_mut() {
        if entry.mount_point == mount_point {
            return Some(entry);
        }
        if let Some(found) = find_mut(&mut entry.children, mount_point) {
            return Some(found);
        }
    }
    None
}
