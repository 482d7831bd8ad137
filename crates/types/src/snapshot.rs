//! `_nav.json` snapshot parsing.
//!
//! The wire payload is validated once here and turned into a canonical
//! [`MenuTree`]; nothing downstream re-checks its shape.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::errors::NavError;
use crate::menu::{GroupingThreshold, MenuTree, ToolEntry};

#[derive(Debug, Deserialize)]
struct WireToolEntry {
    #[serde(default)]
    mount_point: Option<String>,
    name: String,
    url: String,
    #[serde(default)]
    ordinal: Option<i64>,
    #[serde(default)]
    is_anchored: Option<bool>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    children: Option<Vec<WireToolEntry>>,
}

impl MenuTree {
    /// Parses a `_nav.json` body.
    pub fn from_snapshot_json(body: &str) -> Result<Self, NavError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| NavError::snapshot_malformed(format!("invalid JSON: {e}")))?;
        Self::from_snapshot_value(value)
    }

    /// Parses an already-decoded `_nav.json` payload.
    pub fn from_snapshot_value(mut value: Value) -> Result<Self, NavError> {
        let object = value
            .as_object_mut()
            .ok_or_else(|| NavError::snapshot_malformed("snapshot is not a JSON object"))?;
        let menu = object
            .remove("menu")
            .ok_or_else(|| NavError::snapshot_malformed("missing `menu` field"))?;
        if !menu.is_array() {
            return Err(NavError::snapshot_malformed("`menu` is not an array"));
        }
        let wire: Vec<WireToolEntry> =
            serde_json::from_value(menu).map_err(|e| NavError::snapshot_malformed(format!("bad menu entry: {e}")))?;

        let grouping_threshold = parse_threshold(object.get("grouping_threshold"))?;

        let mut seen = HashSet::new();
        let entries = wire
            .into_iter()
            .enumerate()
            .map(|(position, entry)| convert_entry(entry, position, &mut seen))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MenuTree::new(entries, grouping_threshold))
    }

    /// Serializes the tree back into the `_nav.json` wire shape.
    pub fn to_snapshot_value(&self) -> Value {
        json!({
            "menu": self.entries(),
            "grouping_threshold": self.grouping_threshold(),
        })
    }
}

fn parse_threshold(raw: Option<&Value>) -> Result<GroupingThreshold, NavError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(GroupingThreshold::default()),
        Some(Value::Number(number)) => number.as_i64(),
        // the threshold input posts its raw text, so the server may echo a string
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| NavError::snapshot_malformed("`grouping_threshold` is not an integer"))?;

    let threshold = GroupingThreshold::saturating(value);
    if threshold.get() as i64 != value {
        warn!(value, clamped = threshold.get(), "grouping threshold out of range");
    }
    Ok(threshold)
}

fn convert_entry(wire: WireToolEntry, position: usize, seen: &mut HashSet<String>) -> Result<ToolEntry, NavError> {
    let mount_point = match wire.mount_point {
        Some(mount_point) if !mount_point.is_empty() => mount_point,
        _ => {
            let derived = slugify(&wire.name);
            warn!(name = %wire.name, mount_point = %derived, "entry without mount point");
            derived
        }
    };
    if mount_point.is_empty() {
        return Err(NavError::snapshot_malformed(format!(
            "entry '{}' has no usable mount point",
            wire.name
        )));
    }
    if !seen.insert(mount_point.clone()) {
        return Err(NavError::snapshot_malformed(format!("duplicate mount point '{mount_point}'")));
    }

    let children = wire
        .children
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(child_position, child)| convert_entry(child, child_position, seen))
        .collect::<Result<Vec<_>, _>>()?;

    // Missing ordinals fall back to list position; canonicalization renumbers anyway.
    let ordinal = wire
        .ordinal
        .and_then(|ordinal| u32::try_from(ordinal).ok())
        .unwrap_or(position as u32);

    Ok(ToolEntry {
        mount_point,
        name: wire.name,
        url: wire.url,
        ordinal,
        is_anchored: wire.is_anchored.unwrap_or(false),
        tool_name: wire.tool_name,
        icon: wire.icon,
        children,
    })
}

/// Lower-cases `text` and reduces it to `[a-z0-9_-]`, collapsing whitespace and
/// repeated dashes into single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        if ch.is_whitespace() || ch == '-' {
            if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Bucket;

    const SNAPSHOT: &str = r#"{
        "grouping_threshold": 3,
        "menu": [
            {"mount_point": "admin", "name": "Admin", "url": "/p/demo/admin/", "ordinal": 0, "is_anchored": true},
            {"mount_point": "tickets", "name": "Tickets", "url": "/p/demo/tickets/", "ordinal": 4, "is_anchored": null},
            {"mount_point": "summary", "name": "Summary", "url": "/p/demo/", "ordinal": 0, "is_anchored": true},
            {"mount_point": "wiki", "name": "Wiki", "url": "/p/demo/wiki/", "ordinal": 2, "tool_name": "wiki", "icon": "tool-wiki",
             "children": [
                {"mount_point": "notes", "name": "Notes", "url": "/p/demo/notes/", "ordinal": 5},
                {"mount_point": "docs", "name": "Docs", "url": "/p/demo/docs/", "ordinal": 1}
             ]}
        ]
    }"#;

    #[test]
    fn parses_and_canonicalizes_snapshot() {
        let tree = MenuTree::from_snapshot_json(SNAPSHOT).expect("parse snapshot");
        let order: Vec<_> = tree.entries().iter().map(|e| (e.mount_point.as_str(), e.bucket())).collect();
        assert_eq!(
            order,
            vec![
                ("summary", Bucket::Anchored),
                ("wiki", Bucket::Orderable),
                ("tickets", Bucket::Orderable),
                ("admin", Bucket::AdminPinned),
            ]
        );
        assert_eq!(tree.grouping_threshold().get(), 3);
        let wiki = tree.find("wiki").expect("wiki present");
        assert_eq!(wiki.icon.as_deref(), Some("tool-wiki"));
        let children: Vec<_> = wiki.children.iter().map(|e| (e.mount_point.as_str(), e.ordinal)).collect();
        assert_eq!(children, vec![("docs", 0), ("notes", 1)]);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn missing_menu_is_malformed() {
        let err = MenuTree::from_snapshot_json(r#"{"grouping_threshold": 2}"#).unwrap_err();
        assert_eq!(err, NavError::snapshot_malformed("missing `menu` field"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn entry_without_url_is_malformed() {
        let err = MenuTree::from_snapshot_json(r#"{"menu": [{"mount_point": "wiki", "name": "Wiki"}]}"#).unwrap_err();
        assert!(matches!(err, NavError::SnapshotMalformed { .. }));
    }

    #[test]
    fn duplicate_mount_points_are_malformed() {
        let body = r#"{"menu": [
            {"mount_point": "wiki", "name": "Wiki", "url": "/a/"},
            {"mount_point": "code", "name": "Code", "url": "/b/", "children": [
                {"mount_point": "wiki", "name": "Wiki 2", "url": "/c/"}
            ]}
        ]}"#;
        let err = MenuTree::from_snapshot_json(body).unwrap_err();
        assert_eq!(err, NavError::snapshot_malformed("duplicate mount point 'wiki'"));
    }

    #[test]
    fn threshold_accepts_strings_and_clamps() {
        let tree = MenuTree::from_snapshot_json(r#"{"menu": [], "grouping_threshold": "7"}"#).expect("parse");
        assert_eq!(tree.grouping_threshold().get(), 7);
        let tree = MenuTree::from_snapshot_json(r#"{"menu": [], "grouping_threshold": 40}"#).expect("parse");
        assert_eq!(tree.grouping_threshold().get(), 10);
        let tree = MenuTree::from_snapshot_json(r#"{"menu": []}"#).expect("parse");
        assert_eq!(tree.grouping_threshold().get(), 1);
        assert!(MenuTree::from_snapshot_json(r#"{"menu": [], "grouping_threshold": "lots"}"#).is_err());
    }

    #[test]
    fn null_mount_point_falls_back_to_slug() {
        let body = r#"{"menu": [{"mount_point": null, "name": "  Sub Project -- Two! ", "url": "/p/demo/sub/"}]}"#;
        let tree = MenuTree::from_snapshot_json(body).expect("parse");
        assert_eq!(tree.entries()[0].mount_point, "sub-project-two");
    }

    #[test]
    fn snapshot_value_parses_back_to_the_same_tree() {
        let tree = MenuTree::from_snapshot_json(SNAPSHOT).expect("parse");
        let again = MenuTree::from_snapshot_value(tree.to_snapshot_value()).expect("reparse");
        assert_eq!(again, tree);
    }

    #[test]
    fn slugify_matches_url_friendly_form() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("--Tools & Stuff--"), "tools-stuff");
        assert_eq!(slugify("a___b"), "a___b");
        assert_eq!(slugify("Café Ünits"), "caf-nits");
    }
}
