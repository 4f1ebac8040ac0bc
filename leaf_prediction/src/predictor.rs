use crate::{
    category::LeafCategory,
    model_service::{Classifier, InferenceError},
    preprocess::INPUT_SHAPE,
};
use ndarray::Array4;
use serde::Serialize;
use thiserror::Error;

const PROBABILITY_TOLERANCE: f32 = 1e-4;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("input tensor has shape {actual:?}, expected {expected:?}")]
    Shape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("invalid model output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub category: LeafCategory,
    pub confidence: f32,
}

pub fn predict<C: Classifier + ?Sized>(
    model: &C,
    tensor: &Array4<f32>,
) -> Result<Prediction, PredictError> {
    if tensor.shape() != &INPUT_SHAPE[..] {
        return Err(PredictError::Shape {
            expected: INPUT_SHAPE,
            actual: tensor.shape().to_vec(),
        });
    }

    let probabilities = model.infer(tensor.view())?;
    let prediction = select_category(&probabilities)?;

    tracing::debug!(
        "Probabilities {:?}, predicted {} with confidence {:.3}",
        probabilities,
        prediction.category,
        prediction.confidence
    );

    Ok(prediction)
}

/// Arg-max over the model output. Ties go to the lowest index.
pub fn select_category(probabilities: &[f32]) -> Result<Prediction, PredictError> {
    if probabilities.len() != LeafCategory::COUNT {
        return Err(PredictError::InvalidOutput(format!(
            "expected {} values, got {}",
            LeafCategory::COUNT,
            probabilities.len()
        )));
    }

    let range = -PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE;
    if let Some(value) = probabilities
        .iter()
        .find(|p| !p.is_finite() || !range.contains(*p))
    {
        return Err(PredictError::InvalidOutput(format!(
            "{} is not a probability",
            value
        )));
    }

    let (index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0, probabilities[0]), |best, (index, value)| {
            if value > best.1 {
                (index, value)
            } else {
                best
            }
        });

    let category = LeafCategory::from_index(index)
        .ok_or_else(|| PredictError::InvalidOutput(format!("no category at index {}", index)))?;

    Ok(Prediction {
        category,
        confidence: confidence.clamp(0.0, 1.0),
    })
}
