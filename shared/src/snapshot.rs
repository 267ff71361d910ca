use serde::{Deserialize, Serialize};

use crate::layer::GeometryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Group,
    Leaf,
    Placeholder,
}

/// Either a record count or the localized message shown when counting failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureCount {
    Count(u64),
    Failed(String),
}

impl FeatureCount {
    pub fn is_singular(&self) -> bool {
        matches!(self, FeatureCount::Count(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub count: FeatureCount,
    pub geometry_type: GeometryType,
    pub type_label: String,
}

/// One symbology slot; both fields stay `None` until the symbol resolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbologySlot {
    pub label: Option<String>,
    pub artifact: Option<String>,
}

impl SymbologySlot {
    pub fn is_resolved(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Read-only view of the legend tree handed to the display layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegendSnapshot {
    pub entries: Vec<EntrySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub id: u64,
    pub name: String,
    pub kind: EntryKind,
    pub layer_id: Option<String>,
    pub sort_group: i32,
    pub visible: bool,
    pub reorderable: bool,
    pub interactive: bool,
    pub removed: bool,
    pub features: Option<Features>,
    pub symbology: Vec<SymbologySlot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntrySnapshot>,
    pub source_url: Option<String>,
    pub source_index: Option<u32>,
}
