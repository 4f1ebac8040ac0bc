mod health;
mod scan;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use leaf_prediction::ModelLoader;

pub fn scanner_routes<L: ModelLoader>() -> Router<SharedState<L>> {
    Router::new()
        .route("/", get(scan::index::<L>))
        .route("/scan", post(scan::scan::<L>))
        .route("/health", get(health::healthcheck::<L>))
}
