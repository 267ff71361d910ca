//! Visibility of entries generated for dynamic (grouped) layers.
//!
//! The backing layer only understands leaf sublayer ids, so every toggle ends in exactly one
//! push of the full set of visible leaves:
//!
//! - leaf toggle: flip the leaf, push.
//! - subgroup or root toggle: flip the group and every descendant without pushing, then push.
//!
//! Before each push every group under the master is recomputed: a group is visible exactly when
//! at least one leaf below it is.

use std::fmt;
use std::sync::Arc;

use legend_shared::EntryKind;
use tracing::debug;

use crate::legend::entry::{LegendEntry, WeakEntry};
use crate::legend::layer::MapLayer;

/// Links an entry of a dynamic layer to its master group and backing layer.
#[derive(Clone)]
pub struct VisibilityBinding {
    master: WeakEntry,
    layer: Arc<dyn MapLayer>,
}

impl VisibilityBinding {
    pub fn new(master: &LegendEntry, layer: Arc<dyn MapLayer>) -> Self {
        Self {
            master: master.downgrade(),
            layer,
        }
    }

    fn push_visible_leaves(&self) {
        let Some(master) = self.master.upgrade() else {
            debug!("master group dropped; skipping visibility push");
            return;
        };
        sync_group_visibility(&master);
        let ids = visible_leaf_ids(&master);
        debug!(master = master.id(), ?ids, "pushing visible sublayers");
        self.layer.set_visible_layers(&ids);
    }
}

impl fmt::Debug for VisibilityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityBinding").finish_non_exhaustive()
    }
}

/// Binds `master` and all its descendants to `layer` and pushes the starting visible set.
pub fn bind_dynamic_group(master: &LegendEntry, layer: Arc<dyn MapLayer>) {
    let binding = VisibilityBinding::new(master, layer);
    master.walk(&mut |entry| entry.set_visibility_binding(binding.clone()));
    binding.push_visible_leaves();
}

pub fn set_visibility(entry: &LegendEntry, visible: bool) {
    match entry.kind() {
        EntryKind::Group => entry.walk(&mut |node| node.set_visible_flag(visible)),
        EntryKind::Leaf | EntryKind::Placeholder => entry.set_visible_flag(visible),
    }

    match entry.visibility_binding() {
        Some(binding) => binding.push_visible_leaves(),
        None => {
            sync_group_visibility(entry);
        }
    }
}

/// Sets each group under `root` visible exactly when one of its leaves is, and returns whether
/// `root` has a visible leaf. Groups without any leaf keep their flag.
pub(crate) fn sync_group_visibility(root: &LegendEntry) -> bool {
    match root.kind() {
        EntryKind::Group => {
            let children = root.children();
            if children.is_empty() {
                return false;
            }
            let mut any_visible = false;
            for child in &children {
                any_visible |= sync_group_visibility(child);
            }
            if has_leaf(root) {
                root.set_visible_flag(any_visible);
            }
            any_visible
        }
        EntryKind::Leaf | EntryKind::Placeholder => root.is_visible(),
    }
}

fn has_leaf(root: &LegendEntry) -> bool {
    let mut found = false;
    root.walk(&mut |entry| found |= entry.kind() != EntryKind::Group);
    found
}

/// Flips the entry's visibility and returns the new value.
pub fn toggle_visibility(entry: &LegendEntry) -> bool {
    let visible = !entry.is_visible();
    set_visibility(entry, visible);
    visible
}

/// Sublayer ids of the visible leaves under `root`; groups never contribute ids.
pub fn visible_leaf_ids(root: &LegendEntry) -> Vec<u32> {
    let mut ids = Vec::new();
    root.walk(&mut |entry| {
        if entry.kind() == EntryKind::Leaf
            && entry.is_visible()
            && let Some(index) = entry.source_index()
        {
            ids.push(index);
        }
    });
    ids
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::legend::entry::EntryBuilder;
    use crate::test_support::RecordingLayer;

    fn leaf(index: u32) -> LegendEntry {
        EntryBuilder::leaf(format!("leaf-{index}"))
            .source(Some("https://example.com/MapServer".to_string()), Some(index))
            .build()
    }

    /// master -> [A(0), B(1), C(2)]
    fn flat_group(layer: &Arc<RecordingLayer>) -> (LegendEntry, Vec<LegendEntry>) {
        let leaves = vec![leaf(0), leaf(1), leaf(2)];
        let master = leaves
            .iter()
            .cloned()
            .fold(EntryBuilder::group("master"), EntryBuilder::child)
            .build();
        bind_dynamic_group(&master, layer.clone());
        (master, leaves)
    }

    #[test]
    fn binding_pushes_the_starting_visible_set() {
        let layer = Arc::new(RecordingLayer::default());
        let hidden = EntryBuilder::leaf("hidden")
            .source(Some("https://example.com/MapServer".to_string()), Some(3))
            .visible(false)
            .build();
        let master = EntryBuilder::group("master")
            .child(leaf(0))
            .child(hidden)
            .build();

        bind_dynamic_group(&master, layer.clone());

        assert_eq!(layer.pushes(), vec![vec![0]]);
    }

    #[test]
    fn root_toggle_pushes_once_per_toggle() {
        let layer = Arc::new(RecordingLayer::default());
        let (master, _) = flat_group(&layer);

        assert!(!toggle_visibility(&master));
        assert!(toggle_visibility(&master));

        assert_eq!(layer.pushes(), vec![vec![0, 1, 2], vec![], vec![0, 1, 2]]);
    }

    #[test]
    fn leaf_toggle_pushes_remaining_leaves() {
        let layer = Arc::new(RecordingLayer::default());
        let (_, leaves) = flat_group(&layer);

        assert!(!toggle_visibility(&leaves[0]));

        assert_eq!(layer.pushes(), vec![vec![0, 1, 2], vec![1, 2]]);
    }

    #[test]
    fn subgroup_toggle_cascades_without_intermediate_pushes() {
        let layer = Arc::new(RecordingLayer::default());
        let nested_a = leaf(3);
        let nested_b = leaf(4);
        let subgroup = EntryBuilder::group("subgroup")
            .child(nested_a.clone())
            .child(nested_b.clone())
            .build();
        let master = EntryBuilder::group("master")
            .child(leaf(0))
            .child(subgroup.clone())
            .build();
        bind_dynamic_group(&master, layer.clone());

        set_visibility(&subgroup, false);

        assert!(!subgroup.is_visible());
        assert!(!nested_a.is_visible());
        assert!(!nested_b.is_visible());
        assert!(master.is_visible());
        assert_eq!(layer.pushes(), vec![vec![0, 3, 4], vec![0]]);

        assert!(toggle_visibility(&nested_b));
        assert!(subgroup.is_visible());
        assert_eq!(layer.pushes(), vec![vec![0, 3, 4], vec![0], vec![0, 4]]);
    }

    #[test]
    fn groups_follow_their_leaves() {
        let layer = Arc::new(RecordingLayer::default());
        let a = leaf(0);
        let b = leaf(1);
        let subgroup = EntryBuilder::group("subgroup")
            .child(a.clone())
            .child(b.clone())
            .build();
        let master = EntryBuilder::group("master").child(subgroup.clone()).build();
        bind_dynamic_group(&master, layer.clone());

        set_visibility(&a, false);
        set_visibility(&b, false);
        assert!(!subgroup.is_visible());
        assert!(!master.is_visible());

        set_visibility(&master, true);
        set_visibility(&subgroup, false);
        set_visibility(&a, true);
        assert!(subgroup.is_visible());
        assert!(master.is_visible());
        assert!(!b.is_visible());
        assert_eq!(layer.pushes().last(), Some(&vec![0]));
    }

    #[test]
    fn unbound_entries_only_flip_their_flag() {
        let entry = EntryBuilder::leaf("tiles").build();
        assert!(!toggle_visibility(&entry));
        assert!(!entry.is_visible());
    }
}
