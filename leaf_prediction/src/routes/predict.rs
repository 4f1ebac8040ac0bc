use super::ApiError;
use crate::{
    category::LeafCategory, model_service::ModelLoader, preprocess::ImageInput,
    server::SharedState,
};
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/api/predict";
const IMAGE_FIELD: &str = "image";

#[derive(Serialize)]
pub struct PredictResponse {
    prediction: LeafCategory,
    confidence: f32,
    status: &'static str,
}

#[derive(Deserialize)]
struct Base64Image {
    image: Option<String>,
}

#[instrument(skip_all)]
pub async fn predict<L: ModelLoader>(
    State(state): State<SharedState<L>>,
    request: Request,
) -> Result<Json<PredictResponse>, ApiError> {
    let result = run_prediction(&state, request).await;
    match &result {
        Ok(_) => state.metrics.record_request(ROUTE, "success"),
        Err(e) => state.metrics.record_request(ROUTE, e.outcome()),
    }
    result
}

async fn run_prediction<L: ModelLoader>(
    state: &SharedState<L>,
    request: Request,
) -> Result<Json<PredictResponse>, ApiError> {
    let model = state
        .prediction_service
        .model()
        .await
        .map_err(ApiError::ModelUnavailable)?;

    let input = read_image(request).await?;

    let started = Instant::now();
    let prediction = state.prediction_service.predict_with(model, input).await?;
    state
        .metrics
        .record_prediction(prediction.category, started.elapsed().as_millis() as u64);

    Ok(Json(PredictResponse {
        prediction: prediction.category,
        confidence: prediction.confidence,
        status: "success",
    }))
}

async fn read_image(request: Request) -> Result<ImageInput, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        let Json(body) = Json::<Base64Image>::from_request(request, &())
            .await
            .map_err(ApiError::from_json)?;
        return match body.image {
            Some(image) if !image.trim().is_empty() => Ok(ImageInput::Base64(image)),
            _ => Err(ApiError::MissingImage),
        };
    }

    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        tracing::warn!("Failed to read multipart upload: {}", e);
        ApiError::MissingImage
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // Plain text fields are not file uploads.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(ApiError::EmptyFileName);
        }

        let data = field.bytes().await.map_err(ApiError::from_multipart)?;
        tracing::debug!("Received {} ({} bytes)", file_name, data.len());
        return Ok(ImageInput::Bytes(data));
    }

    Err(ApiError::MissingImage)
}

#[cfg(test)]
mod tests {
    use crate::{
        model_service::tests::MockLoader,
        server::{build_router, SharedState},
        service::PredictionService,
        telemetry::Metrics,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use reqwest::{multipart, StatusCode};
    use serde_json::{json, Value};
    use std::{io::Cursor, sync::Arc};
    use tokio::net::TcpListener;

    async fn spawn_app(loader: MockLoader) -> String {
        spawn_app_with_limit(loader, 1024 * 1024).await
    }

    async fn spawn_app_with_limit(loader: MockLoader, max_body_bytes: usize) -> String {
        let state = SharedState {
            prediction_service: PredictionService::new(loader),
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        let router = build_router(state, max_body_bytes);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{}", addr)
    }

    fn png() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(320, 240, Rgb([90, 30, 30]));
        let mut image_data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut image_data), ImageFormat::Png)
            .unwrap();
        image_data
    }

    fn image_form(file_name: &str, data: Vec<u8>) -> multipart::Form {
        multipart::Form::new().part(
            "image",
            multipart::Part::bytes(data).file_name(file_name.to_string()),
        )
    }

    async fn post_form(base: &str, form: multipart::Form) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}/api/predict", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_predict_success() {
        let base = spawn_app(MockLoader::new(vec![0.9, 0.05, 0.03, 0.02])).await;

        let (status, body) = post_form(&base, image_form("leaf.png", png())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Black Measles Disease");
        assert_eq!(body["status"], "success");
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_predict_without_image_field() {
        let base = spawn_app(MockLoader::new(vec![0.25; 4])).await;

        let form = multipart::Form::new().text("note", "no file here");
        let (status, body) = post_form(&base, form).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "No image file provided"}));
    }

    #[tokio::test]
    async fn test_predict_without_multipart_body() {
        let base = spawn_app(MockLoader::new(vec![0.25; 4])).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/predict", base))
            .body("plain text")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "No image file provided"}));
    }

    #[tokio::test]
    async fn test_predict_rejects_oversized_uploads() {
        let base = spawn_app_with_limit(MockLoader::new(vec![0.25; 4]), 1024).await;

        let (status, body) = post_form(&base, image_form("leaf.png", vec![7; 4096])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "Image file too large"}));

        let response = reqwest::Client::new()
            .post(format!("{}/api/predict", base))
            .json(&json!({"image": STANDARD.encode(vec![7u8; 4096])}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "Image file too large"}));
    }

    #[tokio::test]
    async fn test_predict_with_empty_file_name() {
        let base = spawn_app(MockLoader::new(vec![0.25; 4])).await;

        let (status, body) = post_form(&base, image_form("", Vec::new())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "No image file selected"}));
    }

    #[tokio::test]
    async fn test_predict_with_invalid_image() {
        let base = spawn_app(MockLoader::new(vec![0.25; 4])).await;

        let form = image_form("leaf.png", b"GIF89a but not really".to_vec());
        let (status, body) = post_form(&base, form).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid image format"}));
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let base = spawn_app(MockLoader::unavailable()).await;

        let (status, body) = post_form(&base, image_form("leaf.png", png())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Model not available"}));
    }

    #[tokio::test]
    async fn test_predict_with_bad_model_output_is_internal_error() {
        let base = spawn_app(MockLoader::new(vec![0.5, 0.5])).await;

        let (status, body) = post_form(&base, image_form("leaf.png", png())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_predict_base64_json() {
        let base = spawn_app(MockLoader::new(vec![0.1, 0.1, 0.1, 0.7])).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/predict", base))
            .json(&json!({"image": STANDARD.encode(png())}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["prediction"], "Leaf Blight Disease");

        let response = client
            .post(format!("{}/api/predict", base))
            .json(&json!({"picture": "abc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "No image file provided"}));
    }

    #[tokio::test]
    async fn test_health_ignores_model_state() {
        let base = spawn_app(MockLoader::unavailable()).await;

        let response = reqwest::get(format!("{}/api/health", base)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"status": "healthy", "message": "API is running"})
        );
    }

    #[tokio::test]
    async fn test_metrics_exposes_prediction_counts() {
        let base = spawn_app(MockLoader::new(vec![0.1, 0.7, 0.1, 0.1])).await;
        post_form(&base, image_form("leaf.png", png())).await;

        let text = reqwest::get(format!("{}/metrics", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(text.contains("Black Rot Disease"));
    }
}
