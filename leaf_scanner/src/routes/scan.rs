use crate::{
    page::{data_uri, is_accepted, mime_for, render_page, ScanView},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Html,
};
use leaf_prediction::{ImageInput, ModelLoader, ServiceError};
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

const IMAGE_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No image file provided")]
    MissingImage,
    #[error("No image file selected")]
    EmptyFileName,
    #[error("{0} is not supported, upload a jpg, jpeg or png image")]
    Unsupported(String),
    #[error("upload could not be read: {0}")]
    Read(#[from] MultipartError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::Read(e) => e.status(),
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

struct Upload {
    file_name: String,
    data: Bytes,
}

type PageResponse = (StatusCode, Html<String>);

fn page<L: ModelLoader>(
    state: &SharedState<L>,
    status: StatusCode,
    view: &ScanView<'_>,
) -> PageResponse {
    (status, Html(render_page(&state.assets, view)))
}

#[instrument(skip_all)]
pub async fn index<L: ModelLoader>(State(state): State<SharedState<L>>) -> PageResponse {
    match state.prediction_service.model().await {
        Ok(_) => page(&state, StatusCode::OK, &ScanView::Form),
        Err(e) => {
            tracing::error!("Model could not be loaded: {}", e);
            page(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ScanView::ModelUnavailable,
            )
        }
    }
}

#[instrument(skip_all)]
pub async fn scan<L: ModelLoader>(
    State(state): State<SharedState<L>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> PageResponse {
    let model = match state.prediction_service.model().await {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("Model could not be loaded: {}", e);
            return page(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ScanView::ModelUnavailable,
            );
        }
    };

    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::info!("Rejected upload: {}", e);
            return page(&state, e.status(), &ScanView::Failed(e.to_string()));
        }
    };

    let preview = data_uri(mime_for(Path::new(&upload.file_name)), &upload.data);
    let input = ImageInput::Bytes(upload.data);

    match state.prediction_service.predict_with(model, input).await {
        Ok(prediction) => {
            let view = ScanView::Scanned {
                preview: Some(preview),
                prediction,
                recommendation: state.treatments.lookup(prediction.category),
            };
            page(&state, StatusCode::OK, &view)
        }
        Err(ServiceError::Preprocess(e)) => {
            tracing::info!("Rejected image {}: {}", upload.file_name, e);
            page(&state, StatusCode::BAD_REQUEST, &ScanView::Failed(e.to_string()))
        }
        Err(e) => {
            tracing::error!("Error processing image: {}", e);
            page(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                &ScanView::Failed("Internal server error".to_string()),
            )
        }
    }
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, UploadError> {
    let mut multipart = multipart.map_err(|_| UploadError::MissingImage)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(UploadError::EmptyFileName);
        }
        if !is_accepted(&file_name) {
            return Err(UploadError::Unsupported(file_name));
        }

        let data = field.bytes().await?;
        return Ok(Upload { file_name, data });
    }

    Err(UploadError::MissingImage)
}
