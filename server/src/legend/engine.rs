use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use legend_shared::{LayerType, LegendSnapshot, LoadState};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::i18n::UNNAMED_LAYER_KEY;
use crate::legend::entry::{EntryBuilder, EntryId, LegendEntry, LegendTree};
use crate::legend::error::LegendError;
use crate::legend::generators::{EntryGenerator, default_generators};
use crate::legend::layer::LayerRecord;
use crate::legend::runtime::LegendServices;

/// Owns the auto-generated legend of one map.
///
/// A new engine is built whenever the map is rebuilt, which also restarts the numbering of
/// unnamed layers.
#[derive(Clone)]
pub struct LegendEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    legend: Mutex<LegendTree>,
    unnamed_counter: AtomicU64,
    generators: HashMap<LayerType, Arc<dyn EntryGenerator>>,
    services: LegendServices,
    /// Load-state observers of placeholders still waiting for their layer.
    listeners: Mutex<HashMap<EntryId, JoinHandle<()>>>,
}

impl LegendEngine {
    pub fn new(services: LegendServices) -> Self {
        Self::with_generators(services, default_generators())
    }

    pub fn with_generators(
        services: LegendServices,
        generators: HashMap<LayerType, Arc<dyn EntryGenerator>>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                legend: Mutex::new(LegendTree::new()),
                unnamed_counter: AtomicU64::new(0),
                generators,
                services,
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn services(&self) -> &LegendServices {
        &self.inner.services
    }

    /// Inserts a placeholder for `layer` and returns its position.
    ///
    /// The placeholder is swapped for the generated entry, at the same position, the first time
    /// the layer reports [`LoadState::Loaded`].
    pub fn add_placeholder(&self, layer: Arc<LayerRecord>) -> usize {
        if layer.name().is_none() {
            let count = self.inner.unnamed_counter.fetch_add(1, Ordering::Relaxed) + 1;
            layer.assign_name(
                self.inner
                    .services
                    .translator
                    .instant_count(UNNAMED_LAYER_KEY, count),
            );
        }

        let entry = EntryBuilder::placeholder(layer.name().unwrap_or_default())
            .layer_id(layer.layer_id())
            .source(layer.config().url.clone(), None)
            .sort_group(layer.layer_type().sort_group())
            .build();
        layer.set_legend_entry(entry.clone());

        let position = {
            let mut legend = self.inner.legend.lock();
            let index = legend.insertion_index(entry.sort_group());
            legend.add(entry.clone(), index)
        };
        info!(
            layer = layer.layer_id(),
            name = %entry.name(),
            position,
            "inserting placeholder"
        );

        // Registered under the lock so a swap running right away cannot miss its own handle.
        let mut listeners = self.inner.listeners.lock();
        let engine = Arc::downgrade(&self.inner);
        let placeholder = entry.clone();
        let mut state_rx = layer.subscribe();
        let listener = tokio::spawn(async move {
            let loaded = state_rx
                .wait_for(|state| *state == LoadState::Loaded)
                .await
                .is_ok();
            if !loaded {
                debug!(entry = placeholder.id(), "layer dropped before it finished loading");
                return;
            }
            if let Some(engine) = upgrade(&engine) {
                engine.swap_placeholder(&layer, &placeholder);
            }
        });
        listeners.insert(entry.id(), listener);

        position
    }

    fn swap_placeholder(&self, layer: &Arc<LayerRecord>, placeholder: &LegendEntry) {
        info!(layer = layer.layer_id(), "placeholder listener fired");
        self.inner.listeners.lock().remove(&placeholder.id());

        let generator = match self.generator_for(layer.layer_type()) {
            Ok(generator) => generator,
            Err(e) => {
                error!(layer = layer.layer_id(), error = %e, "keeping placeholder for layer");
                return;
            }
        };

        let mut legend = self.inner.legend.lock();
        if placeholder.is_removed() {
            return;
        }
        let Some(index) = legend.remove(placeholder) else {
            return;
        };
        self.install(&mut legend, layer, generator.as_ref(), Some(index));
    }

    /// Generates the entry for `layer` and inserts it at `index`, or appends it.
    pub fn add_layer(
        &self,
        layer: &Arc<LayerRecord>,
        index: Option<usize>,
    ) -> Result<LegendEntry, LegendError> {
        let generator = self.generator_for(layer.layer_type())?;
        let mut legend = self.inner.legend.lock();
        Ok(self.install(&mut legend, layer, generator.as_ref(), index))
    }

    fn generator_for(&self, layer_type: LayerType) -> Result<Arc<dyn EntryGenerator>, LegendError> {
        self.inner
            .generators
            .get(&layer_type)
            .cloned()
            .ok_or(LegendError::UnknownLayerType(layer_type))
    }

    fn install(
        &self,
        legend: &mut LegendTree,
        layer: &Arc<LayerRecord>,
        generator: &dyn EntryGenerator,
        index: Option<usize>,
    ) -> LegendEntry {
        let entry = generator.generate(layer, &self.inner.services);
        entry.set_reorderable(true);
        layer.set_legend_entry(entry.clone());

        let position = legend.add(entry.clone(), index);
        info!(
            layer = layer.layer_id(),
            name = %entry.name(),
            position,
            "inserting legend entry"
        );
        entry
    }

    /// Inserts an existing entry, e.g. one taken out with [`LegendEngine::remove`].
    pub fn add(&self, entry: LegendEntry, index: Option<usize>) -> usize {
        self.inner.legend.lock().add(entry, index)
    }

    /// Removes a top-level entry and returns its former position. Removing twice is a no-op.
    pub fn remove(&self, entry: &LegendEntry) -> Option<usize> {
        if let Some(listener) = self.inner.listeners.lock().remove(&entry.id()) {
            listener.abort();
        }
        let index = self.inner.legend.lock().remove(entry);
        if let Some(index) = index {
            info!(entry = entry.id(), index, "removed legend entry");
        }
        index
    }

    pub fn move_entry(&self, entry: &LegendEntry, index: usize) -> Option<usize> {
        self.inner.legend.lock().move_entry(entry, index)
    }

    pub fn position(&self, entry: &LegendEntry) -> Option<usize> {
        self.inner.legend.lock().position(entry)
    }

    pub fn find(&self, id: EntryId) -> Option<LegendEntry> {
        self.inner.legend.lock().find(id)
    }

    pub fn entries(&self) -> Vec<LegendEntry> {
        self.inner.legend.lock().items().to_vec()
    }

    pub fn snapshot(&self) -> LegendSnapshot {
        let entries = self.entries();
        LegendSnapshot {
            entries: entries.iter().map(LegendEntry::snapshot).collect(),
        }
    }

    /// Resolves once no enrichment task is in flight.
    pub async fn idle(&self) {
        self.inner.services.tasks.idle().await;
    }
}

fn upgrade(inner: &Weak<EngineInner>) -> Option<LegendEngine> {
    inner.upgrade().map(|inner| LegendEngine { inner })
}
