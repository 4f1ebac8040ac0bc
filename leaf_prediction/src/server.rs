use crate::{
    config::Config, model_service::ModelLoader, routes::api_routes,
    service::PredictionService, telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

pub struct SharedState<L: ModelLoader> {
    pub prediction_service: PredictionService<L>,
    pub metrics: Arc<Metrics>,
}

impl<L: ModelLoader> Clone for SharedState<L> {
    fn clone(&self) -> Self {
        Self {
            prediction_service: self.prediction_service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn build_router<L: ModelLoader>(state: SharedState<L>, max_body_bytes: usize) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<L: ModelLoader>(
        prediction_service: PredictionService<L>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let app_state = SharedState {
            prediction_service,
            metrics: Arc::new(Metrics::new()?),
        };
        let router = build_router(app_state, config.upload.max_body_bytes);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

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
