//! In-memory menu model.
//!
//! A [`MenuTree`] is always held in canonical order: in every sibling list the
//! anchored entries come first (server order), then the orderable entries
//! sorted by ordinal and numbered `0..n`, then the admin-pinned entry. Bucket
//! membership is derived from each entry and cannot be set directly.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::ValidationError;

/// Mount point of the administrative tool that always renders last.
pub const ADMIN_MOUNT_POINT: &str = "admin";

/// Which placement rule applies to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Anchored,
    Orderable,
    AdminPinned,
}

/// One navigable tool or mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolEntry {
    pub mount_point: String,
    pub name: String,
    pub url: String,
    pub ordinal: u32,
    pub is_anchored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ToolEntry>,
}

impl ToolEntry {
    /// Creates an orderable entry with ordinal 0 and no children.
    pub fn new(mount_point: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            mount_point: mount_point.into(),
            name: name.into(),
            url: url.into(),
            ordinal: 0,
            is_anchored: false,
            tool_name: None,
            icon: None,
            children: Vec::new(),
        }
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn anchored(mut self) -> Self {
        self.is_anchored = true;
        self
    }

    pub fn with_children(mut self, children: Vec<ToolEntry>) -> Self {
        self.children = children;
        self
    }

    /// True only for the distinguished `admin` mount.
    pub fn is_admin_pinned(&self) -> bool {
        self.mount_point == ADMIN_MOUNT_POINT
    }

    pub fn bucket(&self) -> Bucket {
        if self.is_admin_pinned() {
            Bucket::AdminPinned
        } else if self.is_anchored {
            Bucket::Anchored
        } else {
            Bucket::Orderable
        }
    }

    pub fn is_orderable(&self) -> bool {
        self.bucket() == Bucket::Orderable
    }

    /// Whether `mount_point` names this entry or one of its descendants.
    pub fn contains(&self, mount_point: &str) -> bool {
        self.mount_point == mount_point || self.children.iter().any(|child| child.contains(mount_point))
    }
}

/// Number of sibling tools shown before the remainder is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupingThreshold(u8);

impl GroupingThreshold {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Validates `1 <= value <= 10`.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::InvalidThreshold { value })
        }
    }

    /// Clamps an arbitrary value into the valid range.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl Default for GroupingThreshold {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

/// A sibling list split into its three buckets.
///
/// `orderable` is sorted by ordinal. [`SiblingBuckets::into_entries`] renumbers
/// it and reassembles the canonical order.
#[derive(Debug, Default)]
pub struct SiblingBuckets {
    pub anchored: Vec<ToolEntry>,
    pub orderable: Vec<ToolEntry>,
    pub pinned: Vec<ToolEntry>,
}

impl SiblingBuckets {
    pub fn split(entries: Vec<ToolEntry>) -> Self {
        let mut buckets = Self::default();
        for entry in entries {
            match entry.bucket() {
                Bucket::Anchored => buckets.anchored.push(entry),
                Bucket::Orderable => buckets.orderable.push(entry),
                Bucket::AdminPinned => buckets.pinned.push(entry),
            }
        }
        // stable: equal ordinals keep their incoming order
        buckets.orderable.sort_by_key(|entry| entry.ordinal);
        buckets
    }

    /// Inserts into the orderable bucket, clamping `index` to its length.
    /// Returns the index actually used.
    pub fn insert_orderable(&mut self, index: usize, entry: ToolEntry) -> usize {
        let index = index.min(self.orderable.len());
        self.orderable.insert(index, entry);
        index
    }

    pub fn into_entries(self) -> Vec<ToolEntry> {
        let Self {
            anchored,
            mut orderable,
            pinned,
        } = self;
        for (ordinal, entry) in orderable.iter_mut().enumerate() {
            entry.ordinal = ordinal as u32;
        }
        let mut entries = Vec::with_capacity(anchored.len() + orderable.len() + pinned.len());
        entries.extend(anchored);
        entries.extend(orderable);
        entries.extend(pinned);
        entries
    }
}

/// Puts every sibling list of `entries`, recursively, into canonical order.
pub fn canonicalize(entries: Vec<ToolEntry>) -> Vec<ToolEntry> {
    let entries = entries
        .into_iter()
        .map(|mut entry| {
            entry.children = canonicalize(std::mem::take(&mut entry.children));
            entry
        })
        .collect();
    SiblingBuckets::split(entries).into_entries()
}

/// The project's tool menu plus its grouping threshold.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuTree {
    entries: Vec<ToolEntry>,
    grouping_threshold: GroupingThreshold,
}

impl MenuTree {
    /// Builds a tree, canonicalizing every sibling list.
    pub fn new(entries: Vec<ToolEntry>, grouping_threshold: GroupingThreshold) -> Self {
        Self {
            entries: canonicalize(entries),
            grouping_threshold,
        }
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn grouping_threshold(&self) -> GroupingThreshold {
        self.grouping_threshold
    }

    /// Returns a copy of this tree with a different threshold.
    pub fn with_threshold(&self, grouping_threshold: GroupingThreshold) -> Self {
        Self {
            entries: self.entries.clone(),
            grouping_threshold,
        }
    }

    pub fn into_entries(self) -> Vec<ToolEntry> {
        self.entries
    }

    /// Top-level entries in the given bucket, in display order.
    pub fn bucket(&self, bucket: Bucket) -> impl Iterator<Item = &ToolEntry> {
        self.entries.iter().filter(move |entry| entry.bucket() == bucket)
    }

    pub fn find(&self, mount_point: &str) -> Option<&ToolEntry> {
        let path = self.path_of(mount_point)?;
        let mut list = &self.entries;
        let (last, parents) = path.split_last()?;
        for index in parents {
            list = &list.get(*index)?.children;
        }
        list.get(*last)
    }

    /// Index path from the root to the entry with `mount_point`.
    pub fn path_of(&self, mount_point: &str) -> Option<Vec<usize>> {
        fn walk(list: &[ToolEntry], mount_point: &str, path: &mut Vec<usize>) -> bool {
            for (index, entry) in list.iter().enumerate() {
                path.push(index);
                if entry.mount_point == mount_point || walk(&entry.children, mount_point, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        walk(&self.entries, mount_point, &mut path).then_some(path)
    }

    /// Flattened depth-first `{mount_point -> ordinal}` mapping of every
    /// orderable entry. The ordinal is the position in the flattened order.
    pub fn ordinal_map(&self) -> IndexMap<String, usize> {
        fn walk(list: &[ToolEntry], out: &mut IndexMap<String, usize>) {
            for entry in list {
                if entry.is_orderable() {
                    let next = out.len();
                    out.insert(entry.mount_point.clone(), next);
                }
                walk(&entry.children, out);
            }
        }
        let mut out = IndexMap::new();
        walk(&self.entries, &mut out);
        out
    }

    /// Reports the first violated tree invariant, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        fn check(list: &[ToolEntry], seen: &mut HashSet<String>) -> Result<(), String> {
            let mut previous = Bucket::Anchored;
            let mut expected_ordinal = 0;
            for entry in list {
                if !seen.insert(entry.mount_point.clone()) {
                    return Err(format!("duplicate mount point '{}'", entry.mount_point));
                }
                let bucket = entry.bucket();
                if bucket < previous {
                    return Err(format!("'{}' is out of bucket order", entry.mount_point));
                }
                previous = bucket;
                if bucket == Bucket::Orderable {
                    if entry.ordinal != expected_ordinal {
                        return Err(format!(
                            "'{}' has ordinal {} but {} was expected",
                            entry.mount_point, entry.ordinal, expected_ordinal
                        ));
                    }
                    expected_ordinal += 1;
                }
                check(&entry.children, seen)?;
            }
            Ok(())
        }
        check(&self.entries, &mut HashSet::new())
    }
}
