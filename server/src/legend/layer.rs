use std::sync::Arc;

use futures::future::BoxFuture;
use legend_shared::{GeometryType, LayerConfig, LayerType, LoadState};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::legend::entry::LegendEntry;
use crate::legend::error::LegendError;
use crate::legend::symbology::PendingSymbol;

/// Handle to the map engine's layer object.
pub trait MapLayer: Send + Sync {
    /// Geometry of the layer's features, when the layer knows it.
    fn geometry_type(&self) -> Option<GeometryType>;

    /// Number of features held in memory (file-based layers).
    fn graphics_count(&self) -> usize;

    /// Replaces the set of visible leaf sublayers.
    fn set_visible_layers(&self, sublayer_ids: &[u32]);

    /// Attribute bundle entry for one sublayer.
    fn layer_data(&self, index: u32) -> BoxFuture<'static, Result<LayerData, LegendError>>;
}

pub struct LayerData {
    pub supports_features: bool,
    pub geometry_type: Option<GeometryType>,
    pub legend: LayerLegend,
}

/// Locally derived legend; generated legends carry a single layer.
#[derive(Default)]
pub struct LayerLegend {
    pub layers: Vec<LayerLegendGroup>,
}

#[derive(Default)]
pub struct LayerLegendGroup {
    pub legend: Vec<PendingSymbol>,
}

impl LayerLegend {
    pub fn single(legend: Vec<PendingSymbol>) -> Self {
        Self {
            layers: vec![LayerLegendGroup { legend }],
        }
    }

    /// Symbols of the first legend layer, or nothing when the legend is empty.
    pub fn into_first_symbols(self) -> Vec<PendingSymbol> {
        self.layers
            .into_iter()
            .next()
            .map(|group| group.legend)
            .unwrap_or_default()
    }
}

/// Registry-side record of one map layer.
pub struct LayerRecord {
    config: LayerConfig,
    assigned_name: Mutex<Option<String>>,
    layer: Arc<dyn MapLayer>,
    state_tx: watch::Sender<LoadState>,
    legend_entry: Mutex<Option<LegendEntry>>,
}

impl LayerRecord {
    pub fn new(config: LayerConfig, layer: Arc<dyn MapLayer>) -> Self {
        let (state_tx, _) = watch::channel(LoadState::New);
        Self {
            config,
            assigned_name: Mutex::new(None),
            layer,
            state_tx,
            legend_entry: Mutex::new(None),
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.config.id
    }

    pub fn layer_type(&self) -> LayerType {
        self.config.layer_type
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn map_layer(&self) -> &Arc<dyn MapLayer> {
        &self.layer
    }

    /// Configured name, falling back to one assigned by the legend engine.
    pub fn name(&self) -> Option<String> {
        self.config
            .name
            .clone()
            .or_else(|| self.assigned_name.lock().clone())
    }

    pub(crate) fn assign_name(&self, name: String) {
        *self.assigned_name.lock() = Some(name);
    }

    pub fn load_state(&self) -> LoadState {
        *self.state_tx.borrow()
    }

    pub fn set_load_state(&self, state: LoadState) {
        self.state_tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state_tx.subscribe()
    }

    /// Entry currently representing this layer in the legend.
    pub fn legend_entry(&self) -> Option<LegendEntry> {
        self.legend_entry.lock().clone()
    }

    pub(crate) fn set_legend_entry(&self, entry: LegendEntry) {
        *self.legend_entry.lock() = Some(entry);
    }
}
