use serde::{Deserialize, Serialize};

/// Body of `{service}/legend?f=json` on an ArcGIS map or image service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLegend {
    pub layers: Vec<ServerLegendLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLegendLayer {
    pub layer_id: u32,
    #[serde(default)]
    pub layer_name: Option<String>,
    #[serde(default)]
    pub legend: Vec<ServerLegendItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLegendItem {
    #[serde(default)]
    pub label: String,
    pub image_data: String,
    pub content_type: String,
}

/// Error object ArcGIS services return with a 200 status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LegendResponse {
    Failure { error: ServiceError },
    Legend(ServerLegend),
}
