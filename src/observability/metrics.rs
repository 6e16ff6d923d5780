use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_total: IntCounterVec,
    pub ride_transitions_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub drivers_available: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_total = IntCounterVec::new(
            Opts::new("rides_total", "Ride creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid rides_total metric");

        let ride_transitions_total = IntCounterVec::new(
            Opts::new(
                "ride_transitions_total",
                "Ride lifecycle transitions by transition and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid ride_transitions_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of the nearest-driver scan in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let drivers_available =
            IntGauge::new("drivers_available", "Drivers currently flagged available")
                .expect("valid drivers_available metric");

        registry
            .register(Box::new(rides_total.clone()))
            .expect("register rides_total");
        registry
            .register(Box::new(ride_transitions_total.clone()))
            .expect("register ride_transitions_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(drivers_available.clone()))
            .expect("register drivers_available");

        Self {
            registry,
            rides_total,
            ride_transitions_total,
            match_latency_seconds,
            drivers_available,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
