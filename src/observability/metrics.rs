use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub location_reports_total: IntCounterVec,
    pub feed_events_total: IntCounter,
    pub unread_notifications: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Total delivery status transitions by event and outcome",
            ),
            &["event", "outcome"],
        )
        .expect("valid transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of delivery status transitions in seconds",
            ),
            &["event"],
        )
        .expect("valid transition_latency_seconds metric");

        let location_reports_total = IntCounterVec::new(
            Opts::new(
                "location_reports_total",
                "Total location reports by outcome",
            ),
            &["outcome"],
        )
        .expect("valid location_reports_total metric");

        let feed_events_total = IntCounter::new(
            "feed_events_total",
            "Total live notification events consumed by the feed",
        )
        .expect("valid feed_events_total metric");

        let unread_notifications =
            IntGauge::new("unread_notifications", "Current number of unread notifications")
                .expect("valid unread_notifications metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(location_reports_total.clone()))
            .expect("register location_reports_total");
        registry
            .register(Box::new(feed_events_total.clone()))
            .expect("register feed_events_total");
        registry
            .register(Box::new(unread_notifications.clone()))
            .expect("register unread_notifications");

        Self {
            registry,
            transitions_total,
            transition_latency_seconds,
            location_reports_total,
            feed_events_total,
            unread_notifications,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
