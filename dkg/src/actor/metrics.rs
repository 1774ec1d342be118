use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::counter::Counter;

/// Metrics for the [`Actor`](super::Actor)
#[derive(Default)]
pub struct Metrics {
    /// Number of key generations set up
    pub setups: Counter,
    /// Number of ciphertexts decrypted
    pub decryptions: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register(
            "setups",
            "Number of key generations set up",
            metrics.setups.clone(),
        );
        context.register(
            "decryptions",
            "Number of ciphertexts decrypted",
            metrics.decryptions.clone(),
        );
        metrics
    }
}
