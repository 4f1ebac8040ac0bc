use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    message: String,
}

/// Reports the process only; the model may still be unloaded.
pub async fn healthcheck() -> impl IntoResponse {
    Json(Status {
        status: "healthy".into(),
        message: "API is running".into(),
    })
}
