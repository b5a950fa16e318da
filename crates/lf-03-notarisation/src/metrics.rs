//! # Notary Metrics
//!
//! Prometheus metrics for the notary service.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! lf-03-notarisation = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `notary_requests_total` - Counter of notarisation requests received
//! - `notary_signed_total` - Counter of transactions signed
//! - `notary_refused_total` - Counter of refusals (by error kind)
//! - `notary_commit_batch_size` - Histogram of uniqueness commit batch sizes

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram, IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total notarisation requests received
    pub static ref REQUESTS: IntCounter = register_int_counter!(
        "notary_requests_total",
        "Total number of notarisation requests received"
    )
    .expect("Failed to create REQUESTS metric");

    /// Total transactions signed
    pub static ref SIGNED: IntCounter = register_int_counter!(
        "notary_signed_total",
        "Total number of transactions signed by the notary"
    )
    .expect("Failed to create SIGNED metric");

    /// Total refusals, labeled by error kind
    pub static ref REFUSED: CounterVec = register_counter_vec!(
        "notary_refused_total",
        "Total number of notarisation requests refused",
        &["kind"]
    )
    .expect("Failed to create REFUSED metric");

    /// Requests per uniqueness commit batch
    pub static ref COMMIT_BATCH_SIZE: Histogram = register_histogram!(
        "notary_commit_batch_size",
        "Number of commit requests processed per batch",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0]
    )
    .expect("Failed to create COMMIT_BATCH_SIZE metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a notarisation request received
#[cfg(feature = "metrics")]
pub fn record_request() {
    REQUESTS.inc();
}

/// Record a transaction signed
#[cfg(feature = "metrics")]
pub fn record_signed() {
    SIGNED.inc();
}

/// Record a refusal with its error kind
#[cfg(feature = "metrics")]
pub fn record_refused(kind: &str) {
    REFUSED.with_label_values(&[kind]).inc();
}

/// Record the size of a processed commit batch
#[cfg(feature = "metrics")]
pub fn record_commit_batch(size: usize) {
    COMMIT_BATCH_SIZE.observe(size as f64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_request() {}

#[cfg(not(feature = "metrics"))]
pub fn record_signed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_refused(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_commit_batch(_size: usize) {}
