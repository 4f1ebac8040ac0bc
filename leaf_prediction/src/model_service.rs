use futures::future::{BoxFuture, FutureExt, Shared};
use ndarray::ArrayView4;
use parking_lot::Mutex;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to load model: {0}")]
    Invalid(String),
    #[error("model loading task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("failed to build tensor: {0}")]
    Input(String),
    #[error("inference failed: {0}")]
    Run(String),
    #[error("failed to extract tensor: {0}")]
    Output(String),
}

/// A loaded classifier. Returns the raw output vector for one input batch.
pub trait Classifier: Send + Sync + 'static {
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

pub trait ModelLoader: Send + Sync + 'static {
    type Model: Classifier;

    /// Blocking; called from the blocking thread pool.
    fn load(&self) -> Result<Self::Model, LoadError>;
}

type PendingLoad<M> = Shared<BoxFuture<'static, Result<Arc<M>, LoadError>>>;

/// Lazily loaded, process-wide model.
///
/// The first `get` starts a load and every concurrent caller awaits that
/// same load, so a model is loaded at most once and all waiters see the
/// same handle or the same error. A failed load is forgotten, and the
/// next `get` tries again.
pub struct ModelHandle<L: ModelLoader> {
    loader: Arc<L>,
    slot: Mutex<Option<PendingLoad<L::Model>>>,
}

impl<L: ModelLoader> ModelHandle<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            slot: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<L::Model>, LoadError> {
        let pending = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.start_load();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;
        if result.is_err() {
            let mut slot = self.slot.lock();
            if slot
                .as_ref()
                .is_some_and(|current| current.ptr_eq(&pending))
            {
                *slot = None;
            }
        }

        result
    }

    /// True once a load has completed successfully.
    pub fn is_loaded(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .and_then(|pending| pending.peek())
            .is_some_and(|result| result.is_ok())
    }

    fn start_load(&self) -> PendingLoad<L::Model> {
        let loader = self.loader.clone();
        async move {
            tracing::info!("Loading model");
            let result = tokio::task::spawn_blocking(move || loader.load())
                .await
                .map_err(|e| LoadError::Task(e.to_string()))
                .and_then(|loaded| loaded);

            match result {
                Ok(model) => {
                    tracing::info!("Model loaded successfully");
                    Ok(Arc::new(model))
                }
                Err(e) => {
                    tracing::error!("Error loading model: {}", e);
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }
}
