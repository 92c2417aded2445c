//! Barcode service: short-lived, single-use codes backed by a TTL store.
//!
//! Re-exports everything the binary and the integration tests in `tests/` need.

pub mod api;
pub mod barcode;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;

use barcode::BarcodeService;

/// Shared application state passed to handlers.
pub struct AppState {
    pub barcodes: BarcodeService,
}
