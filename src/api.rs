pub(crate) mod calculate;
pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod rankings;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/trending/calculate", post(calculate::trigger))
        .route("/v1/trending", get(rankings::list))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
