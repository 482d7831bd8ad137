//! Tree renderer: pure projection of a [`MenuTree`] into a view tree.
//!
//! Normal mode is a straight list projection. Admin mode additionally exposes
//! drag handles and folds orderable siblings beyond the grouping threshold into
//! a collapsible group. Grouping is recomputed from ordinals on every call.

use std::fmt;

use navbar_types::{Bucket, DisplayMode, MenuTree, ToolEntry};

/// Drag handle flavour for draggable admin items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragHandle {
    /// Top-level orderable item.
    Top,
    /// Orderable item inside a sub-menu.
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewItem {
    /// Stable element key derived from the mount point.
    pub key: String,
    pub mount_point: String,
    pub name: String,
    pub url: String,
    pub bucket: Bucket,
    pub handle: Option<DragHandle>,
    /// Current page lives under this item's URL (normal mode only).
    pub active: bool,
    pub children: Vec<ViewNode>,
}

/// Collapsible container for siblings past the grouping threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewGroup {
    pub key: String,
    pub members: Vec<ViewNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    Item(ViewItem),
    Group(ViewGroup),
}

impl ViewNode {
    pub fn key(&self) -> &str {
        match self {
            ViewNode::Item(item) => &item.key,
            ViewNode::Group(group) => &group.key,
        }
    }

    pub fn as_item(&self) -> Option<&ViewItem> {
        match self {
            ViewNode::Item(item) => Some(item),
            ViewNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&ViewGroup> {
        match self {
            ViewNode::Group(group) => Some(group),
            ViewNode::Item(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTree {
    pub mode: DisplayMode,
    pub nodes: Vec<ViewNode>,
}

pub fn render(tree: &MenuTree, mode: DisplayMode) -> ViewTree {
    render_at(tree, mode, None)
}

/// Renders with knowledge of the current page path for active-link marking.
pub fn render_at(tree: &MenuTree, mode: DisplayMode, current_path: Option<&str>) -> ViewTree {
    let nodes = match mode {
        DisplayMode::Normal => normal_nodes(tree.entries(), current_path),
        DisplayMode::Admin => admin_nodes(tree.entries(), tree.grouping_threshold().get(), 0),
    };
    ViewTree { mode, nodes }
}

fn normal_nodes(entries: &[ToolEntry], current_path: Option<&str>) -> Vec<ViewNode> {
    entries
        .iter()
        .map(|entry| {
            let active = current_path.is_some_and(|path| !entry.url.is_empty() && path.starts_with(&entry.url));
            ViewNode::Item(ViewItem {
                key: format!("tb-norm-{}", entry.mount_point),
                mount_point: entry.mount_point.clone(),
                name: entry.name.clone(),
                url: entry.url.clone(),
                bucket: entry.bucket(),
                handle: None,
                active,
                children: normal_nodes(&entry.children, current_path),
            })
        })
        .collect()
}

fn admin_nodes(entries: &[ToolEntry], threshold: usize, depth: usize) -> Vec<ViewNode> {
    let item = |entry: &ToolEntry| {
        let handle = match (entry.bucket(), depth) {
            (Bucket::Orderable, 0) => Some(DragHandle::Top),
            (Bucket::Orderable, _) => Some(DragHandle::Sub),
            _ => None,
        };
        ViewNode::Item(ViewItem {
            key: format!("tb-item-{}", entry.mount_point),
            mount_point: entry.mount_point.clone(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            bucket: entry.bucket(),
            handle,
            active: false,
            children: admin_nodes(&entry.children, threshold, depth + 1),
        })
    };

    let mut orderable: Vec<&ToolEntry> = entries.iter().filter(|e| e.is_orderable()).collect();
    orderable.sort_by_key(|entry| entry.ordinal);

    let mut nodes: Vec<ViewNode> = entries
        .iter()
        .filter(|e| e.bucket() == Bucket::Anchored)
        .map(item)
        .collect();

    let split = threshold.min(orderable.len());
    let (shown, excess) = orderable.split_at(split);
    nodes.extend(shown.iter().copied().map(item));
    if let Some(first) = excess.first() {
        nodes.push(ViewNode::Group(ViewGroup {
            key: format!("tb-group-{}", first.mount_point),
            members: excess.iter().copied().map(item).collect(),
        }));
    }

    nodes.extend(entries.iter().filter(|e| e.bucket() == Bucket::AdminPinned).map(item));
    nodes
}

impl fmt::Display for ViewTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[ViewNode], depth: usize) -> fmt::Result {
            for node in nodes {
                let indent = "  ".repeat(depth);
                match node {
                    ViewNode::Item(item) => {
                        let marker = match (item.bucket, item.handle) {
                            (Bucket::Anchored, _) => " (anchored)",
                            (Bucket::AdminPinned, _) => " (admin)",
                            (_, Some(_)) => " =",
                            _ => "",
                        };
                        let active = if item.active { " *" } else { "" };
                        writeln!(f, "{indent}- {} [{}]{marker}{active}", item.name, item.mount_point)?;
                        write_nodes(f, &item.children, depth + 1)?;
                    }
                    ViewNode::Group(group) => {
                        writeln!(f, "{indent}+ more ({})", group.members.len())?;
                        write_nodes(f, &group.members, depth + 1)?;
                    }
                }
            }
            Ok(())
        }
        write_nodes(f, &self.nodes, 0)
    }
}
