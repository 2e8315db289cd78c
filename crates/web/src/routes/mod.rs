use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use puzzle_bridge_core::engine::EngineLauncher;

use crate::AppState;

pub mod engine;
pub mod puzzles;

pub fn router<L: EngineLauncher>(state: Arc<AppState<L>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/:engine/move", post(engine::best_move::<L>))
        .route("/api/puzzles", get(puzzles::list::<L>))
        .route("/api/puzzles/random", get(puzzles::random::<L>))
        .route("/api/puzzles/meta", get(puzzles::meta::<L>))
        .route("/api/puzzles/:id", get(puzzles::by_id::<L>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
pub(crate) mod test_util {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
