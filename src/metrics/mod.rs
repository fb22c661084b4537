// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - RPC handling (per-method outcome and latency)
// - Downstream service calls (auth, user, product)
// - GetShop fallback responses, split by reason (missing row vs store error)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // RPC Metrics
    pub rpc_handled: IntCounterVec,
    pub rpc_duration: HistogramVec,

    // Downstream Metrics
    pub downstream_requests: IntCounterVec,

    // Fallback Metrics
    pub shop_fallbacks: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // RPC Metrics
        let rpc_handled = IntCounterVec::new(
            Opts::new("shop_rpc_handled_total", "RPCs handled, by method and outcome"),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(rpc_handled.clone()))?;

        let rpc_duration = HistogramVec::new(
            HistogramOpts::new("shop_rpc_duration_seconds", "RPC handling duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method"],
        )?;
        registry.register(Box::new(rpc_duration.clone()))?;

        // Downstream Metrics
        let downstream_requests = IntCounterVec::new(
            Opts::new(
                "shop_downstream_requests_total",
                "Downstream service calls, by service and outcome",
            ),
            &["service", "outcome"],
        )?;
        registry.register(Box::new(downstream_requests.clone()))?;

        // Fallback Metrics
        let shop_fallbacks = IntCounterVec::new(
            Opts::new(
                "shop_fallback_responses_total",
                "GetShop responses served with the fallback name, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(shop_fallbacks.clone()))?;

        Ok(Self {
            registry,
            rpc_handled,
            rpc_duration,
            downstream_requests,
            shop_fallbacks,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a handled RPC
    pub fn record_rpc(&self, method: &str, outcome: &str, duration_secs: f64) {
        self.rpc_handled.with_label_values(&[method, outcome]).inc();
        self.rpc_duration
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    /// Helper to record a downstream call outcome
    pub fn record_downstream(&self, service: &str, outcome: &str) {
        self.downstream_requests
            .with_label_values(&[service, outcome])
            .inc();
    }

    /// Helper to record a GetShop fallback response
    pub fn record_shop_fallback(&self, reason: &str) {
        self.shop_fallbacks.with_label_values(&[reason]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
