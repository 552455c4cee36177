//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::geometry::{MapDescription, Wall};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/walls", get(walls_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(state.config.client_origin.as_deref())),
        )
        .with_state(state)
}

/// CORS for a comma-separated origin list, or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick: state.world.tick(),
        players: state.world.player_count(),
    })
}

// ============================================================================
// Static layout endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WallsResponse {
    map_description: Arc<MapDescription>,
    walls: Arc<Vec<Wall>>,
}

async fn walls_handler(State(state): State<AppState>) -> Json<WallsResponse> {
    Json(WallsResponse {
        map_description: state.world.map.clone(),
        walls: state.world.walls.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::{GameLoop, World};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".into(),
            client_origin: None,
            tick_rate: 20,
            snapshot_interval_ticks: 1,
            map_size: 2400.0,
            map_file: None,
            world_seed: Some(1),
            max_players: 8,
            session_timeout: std::time::Duration::from_secs(30),
            chat_burst: 5,
            chat_window: std::time::Duration::from_secs(10),
            input_rate_limit: 60,
        };
        let world = World::new(config.load_map().unwrap(), config.world_settings(1));
        let (_game_loop, handle) = GameLoop::new(world, 1);
        AppState::new(config, handle)
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["players"], 0);
    }

    #[tokio::test]
    async fn test_walls_lists_layout() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/walls").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["mapDescription"]["size"], 2400.0);
        assert!(!json["walls"].as_array().unwrap().is_empty());
    }
}
