mod error;
mod health;
mod metrics;
mod predict;

use crate::{model_service::ModelLoader, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};

pub use error::ApiError;

pub fn api_routes<L: ModelLoader>() -> Router<SharedState<L>> {
    Router::new()
        .route("/api/predict", post(predict::predict::<L>))
        .route("/api/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<L>))
}
