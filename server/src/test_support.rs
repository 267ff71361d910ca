use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use legend_shared::{GeometryType, LayerConfig};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::i18n::Catalog;
use crate::legend::error::LegendError;
use crate::legend::layer::{LayerData, LayerLegend, LayerRecord, MapLayer};
use crate::legend::runtime::LegendServices;
use crate::legend::symbology::{PendingSymbol, SymbologyArtifact};

pub async fn spawn_test_server(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test app");
    });
    (addr, handle)
}

pub fn test_services() -> LegendServices {
    LegendServices::new(reqwest::Client::new(), Arc::new(Catalog::english()))
}

/// Server legend with sublayer 0 (one class) and sublayer 1 (two classes).
pub fn legend_body() -> serde_json::Value {
    serde_json::json!({
        "layers": [
            {
                "layerId": 0,
                "layerName": "Roads",
                "legend": [
                    {"label": "Highway", "imageData": "AAAA", "contentType": "image/png"}
                ]
            },
            {
                "layerId": 1,
                "layerName": "Water",
                "legend": [
                    {"label": "Lakes", "imageData": "BBBB", "contentType": "image/png"},
                    {"label": "Rivers", "imageData": "CCCC", "contentType": "image/png"}
                ]
            }
        ]
    })
}

pub async fn legend_route() -> Json<serde_json::Value> {
    Json(legend_body())
}

pub fn record(config: LayerConfig, layer: impl Into<Arc<RecordingLayer>>) -> Arc<LayerRecord> {
    let layer: Arc<RecordingLayer> = layer.into();
    Arc::new(LayerRecord::new(config, layer))
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should hold before the timeout");
}

/// Map layer double that serves scripted attribute data and records visibility pushes.
#[derive(Default)]
pub struct RecordingLayer {
    geometry: Option<GeometryType>,
    graphics: usize,
    data: HashMap<u32, (bool, Vec<String>)>,
    gate: Option<watch::Receiver<bool>>,
    pushes: Mutex<Vec<Vec<u32>>>,
}

impl RecordingLayer {
    pub fn with_geometry(mut self, geometry: GeometryType) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_graphics(mut self, graphics: usize) -> Self {
        self.graphics = graphics;
        self
    }

    pub fn with_symbols(mut self, index: u32, supports_features: bool, labels: &[&str]) -> Self {
        self.data.insert(
            index,
            (
                supports_features,
                labels.iter().map(|label| (*label).to_string()).collect(),
            ),
        );
        self
    }

    /// Holds every attribute read until the gate turns `true`.
    pub fn with_gate(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn pushes(&self) -> Vec<Vec<u32>> {
        self.pushes.lock().clone()
    }
}

impl MapLayer for RecordingLayer {
    fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry
    }

    fn graphics_count(&self) -> usize {
        self.graphics
    }

    fn set_visible_layers(&self, sublayer_ids: &[u32]) {
        self.pushes.lock().push(sublayer_ids.to_vec());
    }

    fn layer_data(&self, index: u32) -> BoxFuture<'static, Result<LayerData, LegendError>> {
        let configured = self.data.get(&index).cloned();
        let gate = self.gate.clone();
        let geometry_type = self.geometry;
        async move {
            if let Some(mut gate) = gate {
                let _ = gate.wait_for(|open| *open).await;
            }
            let (supports_features, labels) =
                configured.ok_or_else(|| LegendError::AttributeData {
                    index,
                    reason: "not scripted".to_string(),
                })?;
            let symbols: Vec<PendingSymbol> = labels
                .into_iter()
                .enumerate()
                .map(|(position, label)| {
                    future::ready(Ok(SymbologyArtifact {
                        label: Some(label),
                        artifact: format!("svg-{index}-{position}"),
                    }))
                    .boxed()
                })
                .collect();
            Ok(LayerData {
                supports_features,
                geometry_type,
                legend: LayerLegend::single(symbols),
            })
        }
        .boxed()
    }
}
