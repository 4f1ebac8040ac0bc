use crate::{
    config::ModelConfig,
    model_service::{Classifier, InferenceError, LoadError, ModelLoader},
};
use ndarray::{ArrayView4, CowArray, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

pub struct OrtClassifier {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
}

/// Picks the output to read, the first one unless a name is configured.
fn resolve_output_name(available: &[String], wanted: Option<&str>) -> Result<String, LoadError> {
    match wanted {
        Some(name) if available.iter().any(|output| output == name) => Ok(name.to_string()),
        Some(name) => Err(LoadError::Invalid(format!(
            "model has no output named {}, available: {:?}",
            name, available
        ))),
        None => available
            .first()
            .cloned()
            .ok_or_else(|| LoadError::Invalid("model has no outputs".to_string())),
    }
}

fn standard_layout<'a>(input: &'a ArrayView4<'_, f32>) -> CowArray<'a, f32, Ix4> {
    input.as_standard_layout()
}

impl OrtClassifier {
    fn build_session(model_config: &ModelConfig) -> Result<Session, ort::Error> {
        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = model_config.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        builder.commit_from_file(model_config.get_path())
    }

    pub fn new(model_config: &ModelConfig) -> Result<Self, LoadError> {
        let path = model_config.get_path();
        if !path.exists() {
            return Err(LoadError::NotFound(path));
        }

        let sessions = (0..model_config.num_instances)
            .map(|_| Self::build_session(model_config).map(Mutex::new))
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| LoadError::Invalid(e.to_string()))?;

        let available = match sessions.first() {
            Some(session) => session
                .lock()
                .map_err(|e| LoadError::Invalid(e.to_string()))?
                .outputs
                .iter()
                .map(|output| output.name.clone())
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };
        let output_name =
            resolve_output_name(&available, model_config.output_name.as_deref())?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            sessions.len(),
            path
        );

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            output_name,
        })
    }
}

impl Classifier for OrtClassifier {
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| InferenceError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let input = standard_layout(&input);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| InferenceError::Input(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Output(format!("no output named {}", self.output_name))
        })?;
        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Output(e.to_string()))?;

        Ok(data.to_vec())
    }
}

/// Builds ONNX Runtime sessions for the configured model file.
#[derive(Debug, Clone)]
pub struct OrtModelLoader {
    model_config: ModelConfig,
}

impl OrtModelLoader {
    pub fn new(model_config: ModelConfig) -> Self {
        Self { model_config }
    }
}

impl ModelLoader for OrtModelLoader {
    type Model = OrtClassifier;

    fn load(&self) -> Result<OrtClassifier, LoadError> {
        OrtClassifier::new(&self.model_config)
    }
}
