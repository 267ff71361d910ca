use legend_shared::{LegendResponse, ServerLegend};

use crate::legend::error::LegendError;
use crate::legend::runtime::LegendServices;
use crate::legend::symbology::{PendingSymbol, RendererDescriptor, SymbolDescriptor, ValueInfo};

/// Fetches `{service_url}/legend?f=json`. An `error` object in the body is an error too.
pub async fn fetch_remote_legend(
    client: &reqwest::Client,
    service_url: &str,
) -> Result<ServerLegend, LegendError> {
    let url = format!("{}/legend", service_url.trim_end_matches('/'));
    let resp = client
        .get(&url)
        .query(&[("f", "json")])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| LegendError::http(&url, e))?;
    let body: LegendResponse = resp.json().await.map_err(|e| LegendError::http(&url, e))?;

    match body {
        LegendResponse::Legend(legend) => Ok(legend),
        LegendResponse::Failure { error } => Err(LegendError::RemoteLegend {
            service_url: service_url.to_string(),
            code: error.code,
            message: error.message,
        }),
    }
}

/// Builds a unique-value renderer from the legend classes of one sublayer, so layers without
/// a local renderer can go through the regular symbology path.
pub fn to_renderer(
    legend: &ServerLegend,
    sublayer_index: u32,
) -> Result<RendererDescriptor, LegendError> {
    let layer = legend
        .layers
        .iter()
        .find(|layer| layer.layer_id == sublayer_index)
        .ok_or(LegendError::SublayerNotFound {
            index: sublayer_index,
        })?;

    Ok(RendererDescriptor::UniqueValue {
        value_infos: layer
            .legend
            .iter()
            .map(|item| ValueInfo {
                label: item.label.clone(),
                symbol: SymbolDescriptor::PictureMarker {
                    image_data: item.image_data.clone(),
                    content_type: item.content_type.clone(),
                },
            })
            .collect(),
    })
}

pub async fn resolve_remote_legend(
    services: &LegendServices,
    service_url: &str,
    sublayer_index: u32,
) -> Result<Vec<PendingSymbol>, LegendError> {
    let legend = fetch_remote_legend(&services.http, service_url).await?;
    let renderer = to_renderer(&legend, sublayer_index)?;
    Ok(services.symbology.renderer_to_legend(&renderer))
}
