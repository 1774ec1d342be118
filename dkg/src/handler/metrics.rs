use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::counter::Counter;

/// Metrics for the [`Handler`](super::Handler)
#[derive(Default)]
pub struct Metrics {
    /// Number of peer deals processed
    pub deals: Counter,
    /// Number of peer responses processed
    pub responses: Counter,
    /// Number of partial decryptions served
    pub decryptions: Counter,
    /// Number of rejected messages
    pub rejected: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register(
            "deals",
            "Number of peer deals processed",
            metrics.deals.clone(),
        );
        context.register(
            "responses",
            "Number of peer responses processed",
            metrics.responses.clone(),
        );
        context.register(
            "decryptions",
            "Number of partial decryptions served",
            metrics.decryptions.clone(),
        );
        context.register(
            "rejected",
            "Number of rejected messages",
            metrics.rejected.clone(),
        );
        metrics
    }
}
