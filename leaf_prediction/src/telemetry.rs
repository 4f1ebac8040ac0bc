use crate::category::LeafCategory;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("leaf_prediction");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Predictions served, by category")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(duration_boundaries())
            .with_description("Duration of prediction operations in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_counter,
            prediction_duration,
            registry,
        })
    }

    pub fn record_request(&self, route: &str, outcome: &str) {
        let attributes = [
            KeyValue::new("route", route.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction(&self, category: LeafCategory, duration_ms: u64) {
        let attributes = [KeyValue::new("category", category.label())];
        self.prediction_counter.add(1, &attributes);
        self.prediction_duration.record(duration_ms, &attributes);
    }
}

/// Fine-grained below a second, where CPU inference on one image lands.
fn duration_boundaries() -> Vec<f64> {
    (10..=100)
        .step_by(10)
        .chain((150..=500).step_by(50))
        .chain((750..=2000).step_by(250))
        .map(|x| x as f64)
        .collect()
}
