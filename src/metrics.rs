//! Prometheus counters for the barcode lifecycle.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Counters live in the global default registry and are registered on first use.

use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

struct BarcodeMetrics {
    issued_total: IntCounter,
    redeemed_total: IntCounter,
    lookups_total: IntCounterVec,
    validations_total: IntCounterVec,
}

static METRICS: Lazy<BarcodeMetrics> = Lazy::new(|| BarcodeMetrics {
    issued_total: register_int_counter!(opts!(
        "barcode_issued_total",
        "Total number of barcodes issued"
    ))
    .expect("failed to register barcode_issued_total"),
    redeemed_total: register_int_counter!(opts!(
        "barcode_redeemed_total",
        "Total number of redeem calls"
    ))
    .expect("failed to register barcode_redeemed_total"),
    lookups_total: register_int_counter_vec!(
        opts!("barcode_lookups_total", "Barcode fetches by outcome"),
        &["outcome"]
    )
    .expect("failed to register barcode_lookups_total"),
    validations_total: register_int_counter_vec!(
        opts!("barcode_validations_total", "Validity checks by result"),
        &["result"]
    )
    .expect("failed to register barcode_validations_total"),
});

/// Outcome label for `barcode_lookups_total`.
#[derive(Debug, Clone, Copy)]
pub enum LookupOutcome {
    Found,
    NotFound,
    /// Status record present, metadata record missing or unreadable.
    Inconsistent,
}

impl LookupOutcome {
    fn as_str(self) -> &'static str {
        match self {
            LookupOutcome::Found => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::Inconsistent => "inconsistent",
        }
    }
}

pub fn record_issued() {
    METRICS.issued_total.inc();
}

pub fn record_redeemed() {
    METRICS.redeemed_total.inc();
}

pub fn record_lookup(outcome: LookupOutcome) {
    METRICS
        .lookups_total
        .with_label_values(&[outcome.as_str()])
        .inc();
}

pub fn record_validation(valid: bool) {
    let result = if valid { "valid" } else { "invalid" };
    METRICS.validations_total.with_label_values(&[result]).inc();
}

/// Encode all registered metrics as Prometheus text format.
/// Called by the `/metrics` HTTP handler.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
