use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use legend_shared::{EntryKind, EntrySnapshot, Features, LegendSnapshot, SymbologySlot};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::legend::visibility::VisibilityBinding;

pub type EntryId = u64;

/// Sort group of a group entry that has no children to take the minimum from.
pub const DEFAULT_SORT_GROUP: i32 = 0;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to one node of the legend tree.
///
/// Clones point at the same node; background tasks keep a clone and write into it after the
/// generator has returned. A node removed from the tree is tombstoned and ignores those writes.
#[derive(Clone)]
pub struct LegendEntry {
    node: Arc<EntryNode>,
}

#[derive(Clone)]
pub struct WeakEntry {
    node: Weak<EntryNode>,
}

struct EntryNode {
    id: EntryId,
    kind: EntryKind,
    layer_id: Option<String>,
    source_url: Option<String>,
    source_index: Option<u32>,
    state: Mutex<EntryState>,
}

struct EntryState {
    name: String,
    sort_group: Option<i32>,
    visible: bool,
    removed: bool,
    reorderable: bool,
    interactive: bool,
    features: Option<Features>,
    symbology: Vec<SymbologySlot>,
    symbology_generation: u64,
    children: Vec<LegendEntry>,
    visibility: Option<VisibilityBinding>,
}

impl LegendEntry {
    pub fn id(&self) -> EntryId {
        self.node.id
    }

    pub fn kind(&self) -> EntryKind {
        self.node.kind
    }

    pub fn layer_id(&self) -> Option<&str> {
        self.node.layer_id.as_deref()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.node.source_url.as_deref()
    }

    pub fn source_index(&self) -> Option<u32> {
        self.node.source_index
    }

    pub fn name(&self) -> String {
        self.node.state.lock().name.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.node.state.lock().visible
    }

    pub fn is_removed(&self) -> bool {
        self.node.state.lock().removed
    }

    pub fn is_reorderable(&self) -> bool {
        self.node.state.lock().reorderable
    }

    pub fn is_interactive(&self) -> bool {
        self.node.state.lock().interactive
    }

    pub fn features(&self) -> Option<Features> {
        self.node.state.lock().features.clone()
    }

    pub fn symbology(&self) -> Vec<SymbologySlot> {
        self.node.state.lock().symbology.clone()
    }

    pub fn children(&self) -> Vec<LegendEntry> {
        self.node.state.lock().children.clone()
    }

    /// Explicit sort group, or the minimum over the children for groups without one.
    pub fn sort_group(&self) -> i32 {
        let children = {
            let state = self.node.state.lock();
            if let Some(sort_group) = state.sort_group {
                return sort_group;
            }
            state.children.clone()
        };
        children
            .iter()
            .map(LegendEntry::sort_group)
            .min()
            .unwrap_or(DEFAULT_SORT_GROUP)
    }

    pub fn same_entry(&self, other: &LegendEntry) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn downgrade(&self) -> WeakEntry {
        WeakEntry {
            node: Arc::downgrade(&self.node),
        }
    }

    pub(crate) fn set_visible_flag(&self, visible: bool) {
        self.node.state.lock().visible = visible;
    }

    pub(crate) fn set_reorderable(&self, reorderable: bool) {
        self.node.state.lock().reorderable = reorderable;
    }

    pub(crate) fn set_interactive(&self, interactive: bool) {
        self.node.state.lock().interactive = interactive;
    }

    pub(crate) fn visibility_binding(&self) -> Option<VisibilityBinding> {
        self.node.state.lock().visibility.clone()
    }

    pub(crate) fn set_visibility_binding(&self, binding: VisibilityBinding) {
        self.node.state.lock().visibility = Some(binding);
    }

    /// Overwrites the feature summary. Returns `false` when the entry was already removed.
    pub(crate) fn set_features(&self, features: Features) -> bool {
        let mut state = self.node.state.lock();
        if state.removed {
            debug!(entry = self.node.id, "dropping feature count for removed entry");
            return false;
        }
        state.features = Some(features);
        true
    }

    /// Replaces the symbology with `len` unresolved slots and returns the new generation.
    pub(crate) fn reset_symbology(&self, len: usize) -> Option<u64> {
        let mut state = self.node.state.lock();
        if state.removed {
            debug!(entry = self.node.id, "dropping symbology for removed entry");
            return None;
        }
        state.symbology = vec![SymbologySlot::default(); len];
        state.symbology_generation += 1;
        Some(state.symbology_generation)
    }

    pub(crate) fn symbology_generation(&self) -> u64 {
        self.node.state.lock().symbology_generation
    }

    /// Fills one slot if it still belongs to `generation`.
    pub(crate) fn fill_symbology(&self, generation: u64, index: usize, slot: SymbologySlot) -> bool {
        let mut state = self.node.state.lock();
        if state.removed || state.symbology_generation != generation {
            debug!(
                entry = self.node.id,
                index, "dropping late symbol for removed or superseded symbology"
            );
            return false;
        }
        match state.symbology.get_mut(index) {
            Some(target) => {
                *target = slot;
                true
            }
            None => false,
        }
    }

    /// Sets the tombstone on this entry and everything below it.
    pub(crate) fn set_removed(&self, removed: bool) {
        let children = {
            let mut state = self.node.state.lock();
            state.removed = removed;
            state.children.clone()
        };
        for child in &children {
            child.set_removed(removed);
        }
    }

    /// Depth-first, pre-order walk starting at this entry.
    pub fn walk(&self, visit: &mut impl FnMut(&LegendEntry)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn find(&self, id: EntryId) -> Option<LegendEntry> {
        if self.node.id == id {
            return Some(self.clone());
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        let sort_group = self.sort_group();
        let (mut snapshot, children) = {
            let state = self.node.state.lock();
            (
                EntrySnapshot {
                    id: self.node.id,
                    name: state.name.clone(),
                    kind: self.node.kind,
                    layer_id: self.node.layer_id.clone(),
                    sort_group,
                    visible: state.visible,
                    reorderable: state.reorderable,
                    interactive: state.interactive,
                    removed: state.removed,
                    features: state.features.clone(),
                    symbology: state.symbology.clone(),
                    children: Vec::new(),
                    source_url: self.node.source_url.clone(),
                    source_index: self.node.source_index,
                },
                state.children.clone(),
            )
        };
        snapshot.children = children.iter().map(LegendEntry::snapshot).collect();
        snapshot
    }
}

impl fmt::Debug for LegendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegendEntry")
            .field("id", &self.node.id)
            .field("kind", &self.node.kind)
            .field("name", &self.name())
            .finish()
    }
}

impl WeakEntry {
    pub fn upgrade(&self) -> Option<LegendEntry> {
        self.node.upgrade().map(|node| LegendEntry { node })
    }
}

impl fmt::Debug for WeakEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakEntry")
    }
}

pub struct EntryBuilder {
    kind: EntryKind,
    name: String,
    layer_id: Option<String>,
    source_url: Option<String>,
    source_index: Option<u32>,
    sort_group: Option<i32>,
    visible: bool,
    symbology_slots: usize,
    children: Vec<LegendEntry>,
}

impl EntryBuilder {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(EntryKind::Leaf, name.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(EntryKind::Group, name.into())
    }

    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(EntryKind::Placeholder, name.into())
    }

    fn new(kind: EntryKind, name: String) -> Self {
        Self {
            kind,
            name,
            layer_id: None,
            source_url: None,
            source_index: None,
            sort_group: None,
            visible: true,
            symbology_slots: 0,
            children: Vec::new(),
        }
    }

    pub fn layer_id(mut self, layer_id: impl Into<String>) -> Self {
        self.layer_id = Some(layer_id.into());
        self
    }

    pub fn source(mut self, url: Option<String>, index: Option<u32>) -> Self {
        self.source_url = url;
        self.source_index = index;
        self
    }

    pub fn sort_group(mut self, sort_group: i32) -> Self {
        self.sort_group = Some(sort_group);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Number of empty symbology slots the entry starts with.
    ///
    /// Only WMS entries know their slot count up front, one per configured layer entry. Every
    /// other kind starts with no slots and gets one slot per legend class when its legend
    /// arrives, so readers must treat an empty list as "not resolved yet".
    pub fn symbology_slots(mut self, slots: usize) -> Self {
        self.symbology_slots = slots;
        self
    }

    pub fn child(mut self, child: LegendEntry) -> Self {
        if self.kind == EntryKind::Group {
            self.children.push(child);
        } else {
            warn!(name = %self.name, kind = ?self.kind, "ignoring child of non-group entry");
        }
        self
    }

    pub fn build(self) -> LegendEntry {
        LegendEntry {
            node: Arc::new(EntryNode {
                id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
                kind: self.kind,
                layer_id: self.layer_id,
                source_url: self.source_url,
                source_index: self.source_index,
                state: Mutex::new(EntryState {
                    name: self.name,
                    sort_group: self.sort_group,
                    visible: self.visible,
                    removed: false,
                    reorderable: false,
                    interactive: true,
                    features: None,
                    symbology: vec![SymbologySlot::default(); self.symbology_slots],
                    symbology_generation: 0,
                    children: self.children,
                    visibility: None,
                }),
            }),
        }
    }
}

/// Ordered top-level entries of the legend; the invisible root group.
#[derive(Debug, Default)]
pub struct LegendTree {
    items: Vec<LegendEntry>,
}

impl LegendTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[LegendEntry] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, entry: &LegendEntry) -> Option<usize> {
        self.items.iter().position(|item| item.same_entry(entry))
    }

    /// First index whose entry sorts strictly after `sort_group`; `None` means append.
    pub fn insertion_index(&self, sort_group: i32) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.sort_group() > sort_group)
    }

    /// Inserts at `index` (clamped), or appends. Returns the final index.
    pub fn add(&mut self, entry: LegendEntry, index: Option<usize>) -> usize {
        let index = index.map_or(self.items.len(), |index| index.min(self.items.len()));
        entry.set_removed(false);
        self.items.insert(index, entry);
        index
    }

    /// Removes `entry` by identity and returns its former index. Removing twice is a no-op.
    pub fn remove(&mut self, entry: &LegendEntry) -> Option<usize> {
        let index = self.position(entry)?;
        let removed = self.items.remove(index);
        removed.set_removed(true);
        Some(index)
    }

    pub fn move_entry(&mut self, entry: &LegendEntry, index: usize) -> Option<usize> {
        let from = self.position(entry)?;
        let moved = self.items.remove(from);
        let to = index.min(self.items.len());
        self.items.insert(to, moved);
        Some(to)
    }

    pub fn find(&self, id: EntryId) -> Option<LegendEntry> {
        self.items.iter().find_map(|item| item.find(id))
    }

    pub fn snapshot(&self) -> LegendSnapshot {
        LegendSnapshot {
            entries: self.items.iter().map(LegendEntry::snapshot).collect(),
        }
    }
}
