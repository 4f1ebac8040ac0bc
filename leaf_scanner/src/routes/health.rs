use crate::server::SharedState;
use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use leaf_prediction::ModelLoader;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    model_loaded: bool,
}

pub async fn healthcheck<L: ModelLoader>(State(state): State<SharedState<L>>) -> impl IntoResponse {
    Json(Status {
        status: "Available".into(),
        model_loaded: state.prediction_service.is_model_loaded(),
    })
}
