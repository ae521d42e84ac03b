//! BlockStream Observability
//!
//! Metrics for the BlockStream read path.
//!
//! # Features
//!
//! - Prometheus metrics export (`/metrics` endpoint)
//! - Per-cache resident-block gauge that also feeds the global gauge
//!
//! # Usage
//!
//! ```no_run
//! use blockstream_observability::{exporter, metrics};
//!
//! // Initialize metrics
//! metrics::init();
//!
//! // Create metrics router
//! let metrics_router = exporter::create_metrics_router();
//! ```

pub mod exporter;
pub mod gauge;
pub mod metrics;

// Re-export commonly used items
pub use gauge::ResidentBlocksGauge;
pub use metrics::{init as init_metrics, REGISTRY};

/// Initialize all observability components
pub fn init() {
    metrics::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_does_not_panic() {
        init();
    }

    #[test]
    fn test_double_init_is_safe() {
        init();
        init();
    }

    #[test]
    fn test_registry_accessible() {
        init();
        let _registry = &*REGISTRY;
    }
}
