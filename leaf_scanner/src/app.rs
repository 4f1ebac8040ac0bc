use crate::{
    config::Config,
    page::PageAssets,
    server::{HttpServer, SharedState},
    treatment::TreatmentCatalog,
};
use leaf_prediction::{app::shutdown_signal, ort_service::OrtModelLoader, PredictionService};
use std::{error::Error, sync::Arc};
use tokio::sync::broadcast;

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let treatments = match &config.treatments.file {
        Some(path) => TreatmentCatalog::load(path),
        None => TreatmentCatalog::embedded(),
    };
    let treatments = match treatments {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::error!("Failed to load treatments: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let prediction_service = PredictionService::new(OrtModelLoader::new(config.model.clone()));
    if config.model.preload {
        prediction_service.preload();
    }

    let state = SharedState {
        prediction_service,
        treatments,
        assets: Arc::new(PageAssets::load(config.page.background_image.as_deref())),
    };
    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}
