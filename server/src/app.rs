use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::compression::CompressionLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/legend", get(routes::api::get_legend))
        .route(
            "/api/legend/entries/{id}/visibility",
            post(routes::api::set_entry_visibility),
        )
        .route(
            "/api/legend/entries/{id}/position",
            post(routes::api::move_entry),
        )
        .route("/api/legend/entries/{id}", delete(routes::api::delete_entry));

    app.layer(CompressionLayer::new()).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use legend_shared::{LayerConfig, LayerType, LegendSnapshot};

    use super::*;
    use crate::legend::LegendEngine;
    use crate::test_support::test_services;

    async fn spawn_app(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn registered_layer_without_url_is_swapped_in_over_http() {
        let state =
            AppState::with_engine(reqwest::Client::new(), LegendEngine::new(test_services()));
        let mut config = LayerConfig::new("basemap", LayerType::EsriTile);
        config.name = Some("Basemap".to_string());
        let record = state.register_layer(config);
        let (addr, server_handle) = spawn_app(state.clone()).await;
        let client = reqwest::Client::new();

        crate::test_support::wait_until(|| {
            record
                .legend_entry()
                .is_some_and(|entry| entry.is_reorderable())
        })
        .await;

        let legend = client
            .get(format!("http://{addr}/api/legend"))
            .send()
            .await
            .expect("legend request")
            .error_for_status()
            .expect("legend status")
            .json::<LegendSnapshot>()
            .await
            .expect("parse legend");

        assert_eq!(legend.entries.len(), 1);
        assert_eq!(legend.entries[0].name, "Basemap");
        assert_eq!(legend.entries[0].kind, legend_shared::EntryKind::Leaf);
        assert_eq!(state.layers.len(), 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn reregistering_a_layer_id_replaces_its_entry() {
        let state =
            AppState::with_engine(reqwest::Client::new(), LegendEngine::new(test_services()));
        let first = state.register_layer(LayerConfig::new("dup", LayerType::EsriTile));
        let first_entry = first.legend_entry().expect("placeholder");
        state.register_layer(LayerConfig::new("dup", LayerType::EsriTile));

        assert_eq!(state.layers.len(), 1);
        assert!(first_entry.is_removed());
        assert_eq!(state.engine.entries().len(), 1);
    }
}
