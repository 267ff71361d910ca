use std::time::Duration;

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_LAYERS_PATH: &str = "layers.json";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_WMS_LEGEND_FORMAT: &str = "image/png";

/// Count queries are retried once, back-to-back, before giving up.
pub const FEATURE_COUNT_ATTEMPTS: usize = 2;

/// Image services always publish their legend under sublayer 0.
pub const IMAGE_SERVICE_SUBLAYER: u32 = 0;

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

pub fn legend_language() -> String {
    std::env::var("LEGEND_LANGUAGE")
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

pub fn layers_path() -> String {
    std::env::var("LEGEND_LAYERS_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LAYERS_PATH.to_string())
}

pub fn wms_legend_format() -> String {
    std::env::var("WMS_LEGEND_FORMAT")
        .ok()
        .filter(|value| value.contains('/'))
        .unwrap_or_else(|| DEFAULT_WMS_LEGEND_FORMAT.to_string())
}
