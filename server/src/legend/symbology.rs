use futures::FutureExt;
use futures::future::{self, BoxFuture};
use legend_shared::SymbologySlot;
use tracing::warn;

use crate::legend::entry::LegendEntry;
use crate::legend::error::LegendError;
use crate::legend::runtime::TaskSet;

/// Renderer description the symbology subsystem turns into legend symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererDescriptor {
    UniqueValue { value_infos: Vec<ValueInfo> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    pub label: String,
    pub symbol: SymbolDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolDescriptor {
    /// Pre-rendered picture marker (`esriPMS`) as served by legend endpoints.
    PictureMarker {
        image_data: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbologyArtifact {
    pub label: Option<String>,
    pub artifact: String,
}

pub type PendingSymbol = BoxFuture<'static, Result<SymbologyArtifact, LegendError>>;

pub trait SymbologyRenderer: Send + Sync {
    /// One pending symbol per renderer class, in renderer order.
    fn renderer_to_legend(&self, renderer: &RendererDescriptor) -> Vec<PendingSymbol>;

    /// Symbol for one WMS layer whose legend is the image at `image_uri`.
    fn wms_symbology(&self, name: &str, image_uri: &str) -> PendingSymbol;
}

/// Uses picture-marker payloads as `data:` URIs and WMS legend images by reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriSymbology;

impl SymbologyRenderer for DataUriSymbology {
    fn renderer_to_legend(&self, renderer: &RendererDescriptor) -> Vec<PendingSymbol> {
        match renderer {
            RendererDescriptor::UniqueValue { value_infos } => value_infos
                .iter()
                .map(|info| {
                    let resolved = symbol_data_uri(&info.symbol).map(|artifact| SymbologyArtifact {
                        label: Some(info.label.clone()),
                        artifact,
                    });
                    future::ready(resolved).boxed()
                })
                .collect(),
        }
    }

    fn wms_symbology(&self, name: &str, image_uri: &str) -> PendingSymbol {
        future::ready(Ok(SymbologyArtifact {
            label: Some(name.to_string()),
            artifact: image_uri.to_string(),
        }))
        .boxed()
    }
}

fn symbol_data_uri(symbol: &SymbolDescriptor) -> Result<String, LegendError> {
    match symbol {
        SymbolDescriptor::PictureMarker {
            image_data,
            content_type,
        } => {
            if image_data.is_empty() {
                return Err(LegendError::Symbology(
                    "picture marker symbol has no image data".to_string(),
                ));
            }
            Ok(format!("data:{content_type};base64,{image_data}"))
        }
    }
}

/// Replaces the entry's symbology with one empty slot per symbol, then resolves every slot
/// in its own task. Slots that fail to resolve stay empty.
pub fn apply_symbology(tasks: &TaskSet, entry: &LegendEntry, symbols: Vec<PendingSymbol>) {
    let Some(generation) = entry.reset_symbology(symbols.len()) else {
        return;
    };

    for (index, symbol) in symbols.into_iter().enumerate() {
        let entry = entry.clone();
        tasks.spawn(async move {
            match symbol.await {
                Ok(resolved) => {
                    // file-based layers have no labels
                    let slot = SymbologySlot {
                        label: Some(resolved.label.unwrap_or_default()),
                        artifact: Some(resolved.artifact),
                    };
                    entry.fill_symbology(generation, index, slot);
                }
                Err(e) => {
                    warn!(entry = entry.id(), index, error = %e, "symbol failed to resolve");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legend::entry::EntryBuilder;

    fn picture(label: &str, image_data: &str) -> ValueInfo {
        ValueInfo {
            label: label.to_string(),
            symbol: SymbolDescriptor::PictureMarker {
                image_data: image_data.to_string(),
                content_type: "image/png".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn picture_markers_become_data_uris() {
        let renderer = RendererDescriptor::UniqueValue {
            value_infos: vec![picture("Rivers", "AAAA"), picture("Broken", "")],
        };

        let mut symbols = DataUriSymbology.renderer_to_legend(&renderer);
        assert_eq!(symbols.len(), 2);

        let broken = symbols.pop().expect("second symbol").await;
        assert!(matches!(broken, Err(LegendError::Symbology(_))));
        let rivers = symbols.pop().expect("first symbol").await.expect("resolves");
        assert_eq!(rivers.label.as_deref(), Some("Rivers"));
        assert_eq!(rivers.artifact, "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn apply_symbology_fills_slots_and_defaults_labels() {
        let tasks = TaskSet::default();
        let entry = EntryBuilder::leaf("entry").build();
        let (tx, rx) = tokio::sync::oneshot::channel::<SymbologyArtifact>();

        let symbols: Vec<PendingSymbol> = vec![
            async move { rx.await.map_err(|e| LegendError::Symbology(e.to_string())) }.boxed(),
            future::ready(Ok(SymbologyArtifact {
                label: None,
                artifact: "svg-1".to_string(),
            }))
            .boxed(),
            future::ready(Err(LegendError::Symbology("nope".to_string()))).boxed(),
        ];

        apply_symbology(&tasks, &entry, symbols);
        let pending = entry.symbology();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|slot| slot.label.is_none() && slot.artifact.is_none()));

        tx.send(SymbologyArtifact {
            label: Some("slow".to_string()),
            artifact: "svg-0".to_string(),
        })
        .expect("receiver alive");
        tasks.idle().await;

        let resolved = entry.symbology();
        assert_eq!(resolved[0].label.as_deref(), Some("slow"));
        assert_eq!(resolved[1].label.as_deref(), Some(""));
        assert_eq!(resolved[1].artifact.as_deref(), Some("svg-1"));
        assert_eq!(resolved[2], SymbologySlot::default());
    }
}
