mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod category;
pub mod config;
pub mod model_service;
pub mod ort_service;
pub mod predictor;
pub mod preprocess;
pub mod service;

pub use app::start_app;
pub use category::LeafCategory;
pub use model_service::{Classifier, LoadError, ModelHandle, ModelLoader};
pub use predictor::{predict, Prediction};
pub use preprocess::{prepare, ImageInput};
pub use service::{PredictionService, ServiceError};
