use crate::{
    model_service::{LoadError, ModelHandle, ModelLoader},
    predictor::{predict, PredictError, Prediction},
    preprocess::{prepare, ImageInput, PreprocessError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("model not available: {0}")]
    Model(#[from] LoadError),
    #[error("image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("prediction failed: {0}")]
    Predict(#[from] PredictError),
    #[error("prediction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Load, preprocess and classify, shared by the API and the scanner UI.
pub struct PredictionService<L: ModelLoader> {
    model: Arc<ModelHandle<L>>,
}

impl<L: ModelLoader> Clone for PredictionService<L> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<L: ModelLoader> PredictionService<L> {
    pub fn new(loader: L) -> Self {
        Self {
            model: Arc::new(ModelHandle::new(loader)),
        }
    }

    pub async fn model(&self) -> Result<Arc<L::Model>, LoadError> {
        self.model.get().await
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Starts loading in the background. Failures are logged by the loader
    /// and retried on the next request.
    pub fn preload(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service.model().await;
        });
    }

    #[instrument(skip_all)]
    pub async fn predict(&self, input: ImageInput) -> Result<Prediction, ServiceError> {
        let model = self.model().await?;
        self.predict_with(model, input).await
    }

    /// Runs the pipeline against an already resolved model.
    pub async fn predict_with(
        &self,
        model: Arc<L::Model>,
        input: ImageInput,
    ) -> Result<Prediction, ServiceError> {
        let tensor = tokio::task::spawn_blocking(move || prepare(input)).await??;
        let prediction =
            tokio::task::spawn_blocking(move || predict(model.as_ref(), &tensor)).await??;

        tracing::info!(
            "Predicted {} with confidence {:.3}",
            prediction.category,
            prediction.confidence
        );

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{category::LeafCategory, model_service::tests::MockLoader};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    fn png() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(300, 200, Rgb([40, 160, 40]));
        let mut image_data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut image_data), ImageFormat::Png)
            .unwrap();
        image_data
    }

    #[tokio::test]
    async fn test_predict_runs_pipeline() {
        let service = PredictionService::new(MockLoader::new(vec![0.01, 0.02, 0.95, 0.02]));

        let prediction = service.predict(ImageInput::from(png())).await.unwrap();

        assert_eq!(prediction.category, LeafCategory::Healthy);
        assert!((prediction.confidence - 0.95).abs() < 1e-6);
        assert!(service.is_model_loaded());
    }

    #[tokio::test]
    async fn test_predict_reports_missing_model_before_reading_image() {
        let service = PredictionService::new(MockLoader::unavailable());

        let err = service
            .predict(ImageInput::from(b"not an image".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Model(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_predict_rejects_invalid_image() {
        let service = PredictionService::new(MockLoader::new(vec![0.25; 4]));

        let err = service
            .predict(ImageInput::from(b"not an image".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Preprocess(_)));
    }

    #[tokio::test]
    async fn test_preload_loads_once() {
        let loader = MockLoader::new(vec![0.25; 4]);
        let loads = loader.loads.clone();
        let service = PredictionService::new(loader);

        service.preload();
        service.model().await.unwrap();
        service.predict(ImageInput::from(png())).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
