use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use legend_shared::{GeometryType, LayerType, LoadState, ServiceError};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::legend::error::LegendError;
use crate::legend::generators::split_layer_url;
use crate::legend::layer::{LayerData, LayerLegend, LayerRecord, MapLayer};
use crate::legend::remote::{fetch_remote_legend, to_renderer};
use crate::legend::symbology::SymbologyRenderer;

/// Sublayer or service description returned by `?f=json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceMetadata {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    geometry_type: Option<GeometryType>,
    #[serde(default)]
    error: Option<ServiceError>,
}

impl ServiceMetadata {
    fn is_feature_layer(&self) -> bool {
        self.kind.as_deref() == Some("Feature Layer")
    }
}

/// Map layer backed by an ArcGIS REST or WMS endpoint.
pub struct RemoteServiceLayer {
    http: reqwest::Client,
    layer_type: LayerType,
    url: Option<String>,
    symbology: Arc<dyn SymbologyRenderer>,
    geometry_type: Mutex<Option<GeometryType>>,
    visible_layers: Mutex<Option<Vec<u32>>>,
}

impl RemoteServiceLayer {
    pub fn new(
        http: reqwest::Client,
        layer_type: LayerType,
        url: Option<&str>,
        symbology: Arc<dyn SymbologyRenderer>,
    ) -> Self {
        Self {
            http,
            layer_type,
            url: url.map(|url| url.trim_end_matches('/').to_string()),
            symbology,
            geometry_type: Mutex::new(None),
            visible_layers: Mutex::new(None),
        }
    }

    /// Sublayer ids last pushed by the legend, `None` until the first push.
    pub fn visible_layers(&self) -> Option<Vec<u32>> {
        self.visible_layers.lock().clone()
    }

    /// Root of the ArcGIS service, without a trailing sublayer index.
    fn service_root(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        match self.layer_type {
            LayerType::EsriFeature => Some(split_layer_url(url).0),
            _ => Some(url.to_string()),
        }
    }

    /// Moves `record` through `Loading` to `Loaded`, or to `Error` when the service cannot be
    /// described.
    pub async fn load(&self, record: &LayerRecord) {
        record.set_load_state(LoadState::Loading);

        match self.probe().await {
            Ok(geometry_type) => {
                if geometry_type.is_some() {
                    *self.geometry_type.lock() = geometry_type;
                }
                info!(layer = record.layer_id(), "layer loaded");
                record.set_load_state(LoadState::Loaded);
            }
            Err(e) => {
                warn!(layer = record.layer_id(), error = %e, "layer failed to load");
                record.set_load_state(LoadState::Error);
            }
        }
    }

    async fn probe(&self) -> Result<Option<GeometryType>, LegendError> {
        let Some(url) = self.url.as_deref() else {
            return Ok(None);
        };

        if self.layer_type == LayerType::OgcWms {
            self.http
                .get(url)
                .query(&[("SERVICE", "WMS"), ("REQUEST", "GetCapabilities")])
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| LegendError::http(url, e))?;
            return Ok(None);
        }

        let metadata = fetch_metadata(&self.http, url).await?;
        if let Some(error) = metadata.error {
            return Err(LegendError::RemoteLegend {
                service_url: url.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(metadata.geometry_type)
    }
}

async fn fetch_metadata(client: &reqwest::Client, url: &str) -> Result<ServiceMetadata, LegendError> {
    client
        .get(url)
        .query(&[("f", "json")])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| LegendError::http(url, e))?
        .json::<ServiceMetadata>()
        .await
        .map_err(|e| LegendError::http(url, e))
}

impl MapLayer for RemoteServiceLayer {
    fn geometry_type(&self) -> Option<GeometryType> {
        *self.geometry_type.lock()
    }

    fn graphics_count(&self) -> usize {
        0
    }

    fn set_visible_layers(&self, sublayer_ids: &[u32]) {
        debug!(url = ?self.url, ?sublayer_ids, "visible sublayers updated");
        *self.visible_layers.lock() = Some(sublayer_ids.to_vec());
    }

    fn layer_data(&self, index: u32) -> BoxFuture<'static, Result<LayerData, LegendError>> {
        let http = self.http.clone();
        let symbology = Arc::clone(&self.symbology);
        let service_root = self.service_root();

        async move {
            let service_root = service_root.ok_or_else(|| LegendError::AttributeData {
                index,
                reason: "layer has no service url".to_string(),
            })?;
            let metadata = fetch_metadata(&http, &format!("{service_root}/{index}")).await?;
            if let Some(error) = metadata.error {
                return Err(LegendError::AttributeData {
                    index,
                    reason: error.message,
                });
            }
            if !metadata.is_feature_layer() {
                return Ok(LayerData {
                    supports_features: false,
                    geometry_type: metadata.geometry_type,
                    legend: LayerLegend::default(),
                });
            }

            let legend = fetch_remote_legend(&http, &service_root).await?;
            let renderer = to_renderer(&legend, index)?;
            Ok(LayerData {
                supports_features: true,
                geometry_type: metadata.geometry_type,
                legend: LayerLegend::single(symbology.renderer_to_legend(&renderer)),
            })
        }
        .boxed()
    }
}
