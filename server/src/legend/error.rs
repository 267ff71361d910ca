use legend_shared::LayerType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LegendError {
    #[error("no entry generator registered for layer type {0}")]
    UnknownLayerType(LayerType),
    #[error("sublayer {index} not found in server legend")]
    SublayerNotFound { index: u32 },
    #[error("legend service {service_url} returned an error: {message}")]
    RemoteLegend {
        service_url: String,
        code: Option<i64>,
        message: String,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("attribute data for sublayer {index} unavailable: {reason}")]
    AttributeData { index: u32, reason: String },
    #[error("symbology rendering failed: {0}")]
    Symbology(String),
}

impl LegendError {
    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        LegendError::Http {
            url: url.into(),
            source,
        }
    }
}
