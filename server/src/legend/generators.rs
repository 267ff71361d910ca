use std::collections::HashMap;
use std::sync::Arc;

use legend_shared::{FeatureCount, GeometryType, LayerType, SublayerConfig, SymbologySlot};
use tracing::warn;

use crate::config::IMAGE_SERVICE_SUBLAYER;
use crate::legend::entry::{EntryBuilder, LegendEntry};
use crate::legend::feature_count::{apply_feature_count, get_feature_count};
use crate::legend::layer::{LayerRecord, MapLayer};
use crate::legend::remote::resolve_remote_legend;
use crate::legend::runtime::LegendServices;
use crate::legend::symbology::apply_symbology;
use crate::legend::visibility::bind_dynamic_group;

/// Builds the legend entry for one kind of layer.
///
/// Generators return synchronously. Anything that needs the network is spawned on
/// `services.tasks` and writes into the returned entry when it completes.
pub trait EntryGenerator: Send + Sync {
    fn generate(&self, layer: &Arc<LayerRecord>, services: &LegendServices) -> LegendEntry;
}

pub fn default_generators() -> HashMap<LayerType, Arc<dyn EntryGenerator>> {
    let generators: [(LayerType, Arc<dyn EntryGenerator>); 5] = [
        (LayerType::EsriDynamic, Arc::new(DynamicGenerator)),
        (LayerType::EsriFeature, Arc::new(FeatureGenerator)),
        (LayerType::EsriImage, Arc::new(ImageGenerator)),
        (LayerType::EsriTile, Arc::new(TileGenerator)),
        (LayerType::OgcWms, Arc::new(WmsGenerator)),
    ];
    generators.into_iter().collect()
}

fn display_name(layer: &LayerRecord) -> String {
    layer.name().unwrap_or_else(|| layer.layer_id().to_string())
}

fn trimmed_url(layer: &LayerRecord) -> Option<String> {
    layer
        .config()
        .url
        .as_deref()
        .map(|url| url.trim_end_matches('/').to_string())
}

/// Splits `.../MapServer/3` into the service root and sublayer index 3.
pub fn split_layer_url(url: &str) -> (String, Option<u32>) {
    let url = url.trim_end_matches('/');
    match url.rsplit_once('/') {
        Some((root, last)) => match last.parse::<u32>() {
            Ok(index) => (root.to_string(), Some(index)),
            Err(_) => (url.to_string(), None),
        },
        None => (url.to_string(), None),
    }
}

pub struct DynamicGenerator;

impl EntryGenerator for DynamicGenerator {
    fn generate(&self, layer: &Arc<LayerRecord>, services: &LegendServices) -> LegendEntry {
        let service_url = trimmed_url(layer);
        let mut active_leaves = Vec::new();

        let master = layer
            .config()
            .sublayers
            .iter()
            .fold(
                EntryBuilder::group(display_name(layer))
                    .layer_id(layer.layer_id())
                    .source(service_url.clone(), None)
                    .sort_group(layer.layer_type().sort_group()),
                |builder, sublayer| {
                    builder.child(build_sublayer(
                        layer,
                        sublayer,
                        true,
                        service_url.as_deref(),
                        &mut active_leaves,
                    ))
                },
            )
            .build();

        bind_dynamic_group(&master, Arc::clone(layer.map_layer()));

        for leaf in active_leaves {
            let services_for_task = services.clone();
            let map_layer = Arc::clone(layer.map_layer());
            services
                .tasks
                .spawn(enrich_dynamic_leaf(services_for_task, map_layer, leaf));
        }

        master
    }
}

/// A sublayer is visible only when it and every group above it are configured visible.
fn build_sublayer(
    layer: &LayerRecord,
    sublayer: &SublayerConfig,
    parent_visible: bool,
    service_url: Option<&str>,
    active_leaves: &mut Vec<LegendEntry>,
) -> LegendEntry {
    let visible = parent_visible && sublayer.visible;
    let name = sublayer
        .name
        .clone()
        .unwrap_or_else(|| format!("#{}", sublayer.index));
    let source = (service_url.map(str::to_string), Some(sublayer.index));

    if sublayer.is_group() {
        return sublayer
            .children
            .iter()
            .fold(
                EntryBuilder::group(name)
                    .layer_id(layer.layer_id())
                    .source(source.0, source.1)
                    .visible(visible),
                |builder, child| {
                    builder.child(build_sublayer(
                        layer,
                        child,
                        visible,
                        service_url,
                        active_leaves,
                    ))
                },
            )
            .build();
    }

    let leaf = EntryBuilder::leaf(name)
        .layer_id(layer.layer_id())
        .source(source.0, source.1)
        .sort_group(layer.layer_type().sort_group())
        .visible(visible)
        .build();
    if sublayer.active {
        active_leaves.push(leaf.clone());
    }
    leaf
}

async fn enrich_dynamic_leaf(
    services: LegendServices,
    map_layer: Arc<dyn MapLayer>,
    leaf: LegendEntry,
) {
    let Some(index) = leaf.source_index() else {
        return;
    };
    let data = match map_layer.layer_data(index).await {
        Ok(data) => data,
        Err(e) => {
            warn!(entry = leaf.id(), index, error = %e, "no attribute data for sublayer");
            return;
        }
    };
    let service_url = leaf.source_url().map(str::to_string);
    let translator = services.translator.as_ref();

    if data.supports_features {
        let geometry_type = data.geometry_type.or_else(|| map_layer.geometry_type());
        apply_symbology(&services.tasks, &leaf, data.legend.into_first_symbols());

        if let Some(service_url) = service_url {
            let count =
                get_feature_count(&services.http, translator, &format!("{service_url}/{index}"))
                    .await;
            apply_feature_count(translator, geometry_type, &leaf, count);
        }
        return;
    }

    // No local renderer: nothing to count or query, and the legend has to come from the server.
    apply_feature_count(
        translator,
        Some(GeometryType::Generic),
        &leaf,
        FeatureCount::Count(0),
    );
    leaf.set_interactive(false);

    let Some(service_url) = service_url else {
        return;
    };
    match resolve_remote_legend(&services, &service_url, index).await {
        Ok(symbols) => apply_symbology(&services.tasks, &leaf, symbols),
        Err(e) => {
            warn!(entry = leaf.id(), %service_url, index, error = %e, "server legend unavailable");
        }
    }
}

/// Tile caches carry no queryable attributes; the entry is never enriched.
pub struct TileGenerator;

impl EntryGenerator for TileGenerator {
    fn generate(&self, layer: &Arc<LayerRecord>, _services: &LegendServices) -> LegendEntry {
        EntryBuilder::leaf(display_name(layer))
            .layer_id(layer.layer_id())
            .source(trimmed_url(layer), None)
            .sort_group(layer.layer_type().sort_group())
            .build()
    }
}

pub struct FeatureGenerator;

impl EntryGenerator for FeatureGenerator {
    fn generate(&self, layer: &Arc<LayerRecord>, services: &LegendServices) -> LegendEntry {
        let (service_url, index) = match layer.config().url.as_deref() {
            Some(url) => {
                let (root, index) = split_layer_url(url);
                (Some(root), index.unwrap_or(0))
            }
            None => (None, 0),
        };
        let entry = EntryBuilder::leaf(display_name(layer))
            .layer_id(layer.layer_id())
            .source(service_url.clone(), Some(index))
            .sort_group(layer.layer_type().sort_group())
            .build();
        let map_layer = Arc::clone(layer.map_layer());

        match service_url {
            Some(service_url) => {
                let services_for_task = services.clone();
                let map_layer = Arc::clone(&map_layer);
                let entry = entry.clone();
                services.tasks.spawn(async move {
                    let translator = services_for_task.translator.as_ref();
                    let count = get_feature_count(
                        &services_for_task.http,
                        translator,
                        &format!("{service_url}/{index}"),
                    )
                    .await;
                    apply_feature_count(translator, map_layer.geometry_type(), &entry, count);
                });
            }
            None => {
                let count = FeatureCount::Count(map_layer.graphics_count() as u64);
                apply_feature_count(
                    services.translator.as_ref(),
                    map_layer.geometry_type(),
                    &entry,
                    count,
                );
            }
        }

        let tasks = services.tasks.clone();
        let target = entry.clone();
        services.tasks.spawn(async move {
            match map_layer.layer_data(index).await {
                Ok(data) => apply_symbology(&tasks, &target, data.legend.into_first_symbols()),
                Err(e) => {
                    warn!(entry = target.id(), index, error = %e, "no attribute data for feature layer");
                }
            }
        });

        entry
    }
}

pub struct ImageGenerator;

impl EntryGenerator for ImageGenerator {
    fn generate(&self, layer: &Arc<LayerRecord>, services: &LegendServices) -> LegendEntry {
        let service_url = trimmed_url(layer);
        let entry = EntryBuilder::leaf(display_name(layer))
            .layer_id(layer.layer_id())
            .source(service_url.clone(), Some(IMAGE_SERVICE_SUBLAYER))
            .sort_group(layer.layer_type().sort_group())
            .build();

        let Some(service_url) = service_url else {
            warn!(layer = layer.layer_id(), "image layer has no url; legend left empty");
            return entry;
        };

        let services_for_task = services.clone();
        let target = entry.clone();
        services.tasks.spawn(async move {
            match resolve_remote_legend(&services_for_task, &service_url, IMAGE_SERVICE_SUBLAYER)
                .await
            {
                Ok(symbols) => apply_symbology(&services_for_task.tasks, &target, symbols),
                Err(e) => {
                    warn!(entry = target.id(), %service_url, error = %e, "image service legend unavailable");
                }
            }
        });

        entry
    }
}

/// `GetLegendGraphic` request for one WMS layer.
pub fn legend_graphic_url(service_url: &str, layer_id: &str, format: &str) -> Option<String> {
    let mut url = reqwest::Url::parse(service_url).ok()?;
    url.query_pairs_mut()
        .append_pair("SERVICE", "WMS")
        .append_pair("REQUEST", "GetLegendGraphic")
        .append_pair("VERSION", "1.3.0")
        .append_pair("FORMAT", format)
        .append_pair("LAYER", layer_id);
    Some(url.into())
}

pub struct WmsGenerator;

impl EntryGenerator for WmsGenerator {
    fn generate(&self, layer: &Arc<LayerRecord>, services: &LegendServices) -> LegendEntry {
        let layer_entries = &layer.config().layer_entries;
        let service_url = trimmed_url(layer);
        let entry = EntryBuilder::leaf(display_name(layer))
            .layer_id(layer.layer_id())
            .source(service_url.clone(), None)
            .sort_group(layer.layer_type().sort_group())
            .symbology_slots(layer_entries.len())
            .build();

        let Some(service_url) = service_url else {
            warn!(layer = layer.layer_id(), "WMS layer has no url; legend left empty");
            return entry;
        };
        let generation = entry.symbology_generation();

        for (index, wms_layer) in layer_entries.iter().enumerate() {
            let label = wms_layer.name.clone().unwrap_or_else(|| wms_layer.id.clone());
            let Some(image_uri) =
                legend_graphic_url(&service_url, &wms_layer.id, &services.wms_legend_format)
            else {
                warn!(%service_url, "WMS url is not absolute; legend left empty");
                break;
            };
            let pending = services.symbology.wms_symbology(&label, &image_uri);
            let target = entry.clone();
            services.tasks.spawn(async move {
                match pending.await {
                    Ok(resolved) => {
                        let slot = SymbologySlot {
                            label: resolved.label.or(Some(label)),
                            artifact: Some(resolved.artifact),
                        };
                        target.fill_symbology(generation, index, slot);
                    }
                    Err(e) => {
                        warn!(entry = target.id(), index, error = %e, "WMS legend graphic failed");
                    }
                }
            });
        }

        entry
    }
}
