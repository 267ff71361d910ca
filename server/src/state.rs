use std::sync::Arc;

use dashmap::DashMap;
use legend_shared::LayerConfig;
use tracing::{info, warn};

use crate::config::{
    legend_language, upstream_connect_timeout, upstream_http_timeout, wms_legend_format,
};
use crate::i18n::Catalog;
use crate::legend::{LayerRecord, LegendEngine, LegendServices};
use crate::services::layer_loader::RemoteServiceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: LegendEngine,
    /// Layer id -> registered layer.
    pub layers: Arc<DashMap<String, Arc<LayerRecord>>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new() -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("legend-server/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });

        let catalog = Catalog::for_language(&legend_language());
        info!(language = catalog.language(), "legend language selected");
        let services = LegendServices::new(http_client.clone(), Arc::new(catalog))
            .with_wms_legend_format(wms_legend_format());

        Self::with_engine(http_client, LegendEngine::new(services))
    }

    pub fn with_engine(http_client: reqwest::Client, engine: LegendEngine) -> Self {
        Self {
            engine,
            layers: Arc::new(DashMap::new()),
            http_client,
        }
    }

    /// Registers a configured layer: a placeholder goes into the legend right away and the
    /// layer is loaded in the background.
    pub fn register_layer(&self, config: LayerConfig) -> Arc<LayerRecord> {
        let remote = Arc::new(RemoteServiceLayer::new(
            self.http_client.clone(),
            config.layer_type,
            config.url.as_deref(),
            Arc::clone(&self.engine.services().symbology),
        ));
        let record = Arc::new(LayerRecord::new(config, remote.clone()));
        if let Some(previous) = self
            .layers
            .insert(record.layer_id().to_string(), Arc::clone(&record))
        {
            warn!(layer = previous.layer_id(), "layer id registered twice; replacing");
            if let Some(entry) = previous.legend_entry() {
                self.engine.remove(&entry);
            }
        }

        self.engine.add_placeholder(Arc::clone(&record));

        let loading = Arc::clone(&record);
        tokio::spawn(async move {
            remote.load(&loading).await;
        });
        record
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
