//! Barcode lifecycle: issue, inspect, validate, redeem.
//!
//! ## Redis Key Patterns
//!
//! ```text
//! barcode:{code}        → "{code}" while active, "used" once redeemed
//! barcode:{code}:dto    → Barcode JSON snapshot taken at issue time
//! ```
//!
//! Both keys are written with the physical TTL (logical window + buffer).

mod codegen;
mod service;

pub use codegen::CodeGenerator;
pub use service::BarcodeService;

/// Validity window communicated to callers.
pub const LOGICAL_TTL_SECS: u64 = 5 * 60;

/// Grace period the records outlive the logical window by.
pub const BUFFER_SECS: u64 = 2 * 60;

/// Store-level lifetime of both records.
pub const PHYSICAL_TTL_SECS: u64 = LOGICAL_TTL_SECS + BUFFER_SECS;

pub const CODE_LENGTH: usize = 24;
