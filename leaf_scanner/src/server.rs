use crate::{
    config::Config, page::PageAssets, routes::scanner_routes, treatment::TreatmentCatalog,
};
use axum::{extract::DefaultBodyLimit, Router};
use leaf_prediction::{ModelLoader, PredictionService};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

pub struct SharedState<L: ModelLoader> {
    pub prediction_service: PredictionService<L>,
    pub treatments: Arc<TreatmentCatalog>,
    pub assets: Arc<PageAssets>,
}

impl<L: ModelLoader> Clone for SharedState<L> {
    fn clone(&self) -> Self {
        Self {
            prediction_service: self.prediction_service.clone(),
            treatments: self.treatments.clone(),
            assets: self.assets.clone(),
        }
    }
}

pub fn build_router<L: ModelLoader>(state: SharedState<L>, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(scanner_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<L: ModelLoader>(
        state: SharedState<L>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();
        let router = build_router(state, config.upload.max_body_bytes);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting scanner on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok::<(), anyhow::Error>(())
        });

        Ok(server_handle)
    }
}
