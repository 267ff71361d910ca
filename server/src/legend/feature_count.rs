use legend_shared::{FeatureCount, Features, GeometryType};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FEATURE_COUNT_ATTEMPTS;
use crate::i18n::{COUNT_FAILED_KEY, Translator};
use crate::legend::entry::LegendEntry;

#[derive(Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: Option<u64>,
}

/// Queries `{layer_url}/query` for the record count.
///
/// A missing or zero count, an undecodable body and a transport failure all count as a failed
/// attempt. The query is retried once, immediately; after that the localized failure message
/// is returned in place of the number.
pub async fn get_feature_count(
    client: &reqwest::Client,
    translator: &dyn Translator,
    layer_url: &str,
) -> FeatureCount {
    let url = format!("{}/query", layer_url.trim_end_matches('/'));

    for attempt in 1..=FEATURE_COUNT_ATTEMPTS {
        match query_count(client, &url).await {
            Ok(Some(count)) if count > 0 => return FeatureCount::Count(count),
            Ok(_) => debug!(%url, attempt, "count query returned no usable count"),
            Err(e) => debug!(%url, attempt, error = %e, "count query failed"),
        }
    }

    warn!(%url, "giving up on feature count after {FEATURE_COUNT_ATTEMPTS} attempts");
    FeatureCount::Failed(translator.instant(COUNT_FAILED_KEY))
}

async fn query_count(client: &reqwest::Client, url: &str) -> Result<Option<u64>, reqwest::Error> {
    let resp = client
        .get(url)
        .query(&[
            ("where", "1=1"),
            ("returnCountOnly", "true"),
            ("returnGeometry", "false"),
            ("f", "json"),
        ])
        .send()
        .await?
        .error_for_status()?;
    let body: CountResponse = resp.json().await?;
    Ok(body.count)
}

/// Writes the feature summary of `entry`. The singular label is used only when `count` is
/// exactly one; failure strings take the plural form.
pub fn apply_feature_count(
    translator: &dyn Translator,
    geometry_type: Option<GeometryType>,
    entry: &LegendEntry,
    count: FeatureCount,
) {
    let geometry_type = geometry_type.unwrap_or(GeometryType::Generic);
    let labels = translator.instant(geometry_type.label_key());
    let (singular, plural) = labels.split_once('|').unwrap_or((labels.as_str(), labels.as_str()));
    let type_label = if count.is_singular() { singular } else { plural }.to_string();

    entry.set_features(Features {
        count,
        geometry_type,
        type_label,
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;
    use crate::i18n::Catalog;
    use crate::legend::entry::EntryBuilder;
    use crate::test_support::spawn_test_server;

    /// Serves the scripted bodies in order, repeating the last one.
    fn scripted_count_router(bodies: Vec<serde_json::Value>, calls: Arc<AtomicUsize>) -> Router {
        let bodies = Arc::new(bodies);
        Router::new().route(
            "/layer/0/query",
            get(
                move |State(calls): State<Arc<AtomicUsize>>,
                      Query(params): Query<HashMap<String, String>>| {
                    let bodies = Arc::clone(&bodies);
                    async move {
                        assert_eq!(params.get("returnCountOnly").map(String::as_str), Some("true"));
                        assert_eq!(params.get("where").map(String::as_str), Some("1=1"));
                        let call = calls.fetch_add(1, Ordering::SeqCst);
                        Json(bodies[call.min(bodies.len() - 1)].clone())
                    }
                },
            ),
        )
        .with_state(calls)
    }

    #[tokio::test]
    async fn retries_once_and_returns_second_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = scripted_count_router(
            vec![serde_json::json!({}), serde_json::json!({"count": 42})],
            Arc::clone(&calls),
        );
        let (addr, server) = spawn_test_server(router).await;

        let count = get_feature_count(
            &reqwest::Client::new(),
            &Catalog::english(),
            &format!("http://{addr}/layer/0"),
        )
        .await;

        assert_eq!(count, FeatureCount::Count(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        server.abort();
    }

    #[tokio::test]
    async fn two_failures_resolve_to_failure_message() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = scripted_count_router(
            vec![
                serde_json::json!({"error": {"code": 500}}),
                serde_json::json!({"count": 0}),
            ],
            Arc::clone(&calls),
        );
        let (addr, server) = spawn_test_server(router).await;

        let count = get_feature_count(
            &reqwest::Client::new(),
            &Catalog::english(),
            &format!("http://{addr}/layer/0"),
        )
        .await;

        assert_eq!(count, FeatureCount::Failed("Count failed".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        server.abort();
    }

    #[tokio::test]
    async fn first_usable_count_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = scripted_count_router(vec![serde_json::json!({"count": 7})], Arc::clone(&calls));
        let (addr, server) = spawn_test_server(router).await;

        let count = get_feature_count(
            &reqwest::Client::new(),
            &Catalog::english(),
            &format!("http://{addr}/layer/0/"),
        )
        .await;

        assert_eq!(count, FeatureCount::Count(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_service_still_resolves() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe listener");
        let addr = listener.local_addr().expect("listener address");
        drop(listener);

        let count = get_feature_count(
            &reqwest::Client::new(),
            &Catalog::french(),
            &format!("http://{addr}/layer/0"),
        )
        .await;

        assert_eq!(
            count,
            FeatureCount::Failed("Échec du dénombrement".to_string())
        );
    }

    #[test]
    fn apply_feature_count_picks_label_form_from_count() {
        let catalog = Catalog::english();
        let entry = EntryBuilder::leaf("wells").build();

        apply_feature_count(
            &catalog,
            Some(GeometryType::Point),
            &entry,
            FeatureCount::Count(1),
        );
        let features = entry.features().expect("features written");
        assert_eq!(features.type_label, "point");
        assert_eq!(features.geometry_type, GeometryType::Point);

        apply_feature_count(&catalog, None, &entry, FeatureCount::Count(12));
        let features = entry.features().expect("features written");
        assert_eq!(features.type_label, "features");
        assert_eq!(features.geometry_type, GeometryType::Generic);
        assert_eq!(features.count, FeatureCount::Count(12));

        apply_feature_count(
            &catalog,
            Some(GeometryType::Polygon),
            &entry,
            FeatureCount::Failed("Count failed".to_string()),
        );
        assert_eq!(
            entry.features().expect("features written").type_label,
            "polygons"
        );
    }
}
