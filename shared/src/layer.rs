use std::fmt;

use serde::{Deserialize, Serialize};

/// Layer kinds the legend knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    #[serde(rename = "esriDynamic")]
    EsriDynamic,
    #[serde(rename = "esriFeature")]
    EsriFeature,
    #[serde(rename = "esriImage")]
    EsriImage,
    #[serde(rename = "esriTile")]
    EsriTile,
    #[serde(rename = "ogcWms")]
    OgcWms,
}

impl LayerType {
    pub const ALL: [LayerType; 5] = [
        LayerType::EsriDynamic,
        LayerType::EsriFeature,
        LayerType::EsriImage,
        LayerType::EsriTile,
        LayerType::OgcWms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::EsriDynamic => "esriDynamic",
            LayerType::EsriFeature => "esriFeature",
            LayerType::EsriImage => "esriImage",
            LayerType::EsriTile => "esriTile",
            LayerType::OgcWms => "ogcWms",
        }
    }

    /// Sort group used when inserting a new top-level entry.
    ///
    /// Feature layers stay above raster-ish layers, basemap-like tiles sink to the bottom.
    pub fn sort_group(self) -> i32 {
        match self {
            LayerType::EsriFeature => 0,
            LayerType::EsriDynamic | LayerType::EsriImage | LayerType::OgcWms => 1,
            LayerType::EsriTile => 2,
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    New,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    #[serde(rename = "esriGeometryPoint")]
    Point,
    #[serde(rename = "esriGeometryMultipoint")]
    Multipoint,
    #[serde(rename = "esriGeometryPolyline")]
    Polyline,
    #[serde(rename = "esriGeometryPolygon")]
    Polygon,
    #[serde(rename = "generic")]
    Generic,
}

impl GeometryType {
    /// Translation key holding the `singular|plural` label pair.
    pub fn label_key(self) -> &'static str {
        match self {
            GeometryType::Point => "geometry.type.esriGeometryPoint",
            GeometryType::Multipoint => "geometry.type.esriGeometryMultipoint",
            GeometryType::Polyline => "geometry.type.esriGeometryPolyline",
            GeometryType::Polygon => "geometry.type.esriGeometryPolygon",
            GeometryType::Generic => "geometry.type.generic",
        }
    }
}

/// One layer as declared in the map configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub layer_type: LayerType,
    #[serde(default)]
    pub url: Option<String>,
    /// Sublayer tree of a dynamic service.
    #[serde(default)]
    pub sublayers: Vec<SublayerConfig>,
    /// Advertised WMS layers, one legend slot each.
    #[serde(default)]
    pub layer_entries: Vec<WmsLayerEntry>,
}

impl LayerConfig {
    pub fn new(id: impl Into<String>, layer_type: LayerType) -> Self {
        Self {
            id: id.into(),
            name: None,
            layer_type,
            url: None,
            sublayers: Vec::new(),
            layer_entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SublayerConfig {
    pub index: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Inactive leaves are listed but never enriched with counts or symbology.
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub children: Vec<SublayerConfig>,
}

impl SublayerConfig {
    pub fn leaf(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: Some(name.into()),
            visible: true,
            active: true,
            children: Vec::new(),
        }
    }

    pub fn group(index: u32, name: impl Into<String>, children: Vec<SublayerConfig>) -> Self {
        Self {
            children,
            ..Self::leaf(index, name)
        }
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmsLayerEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_true() -> bool {
    true
}
