use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub ws_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total delivery acceptances by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Total delivery rejections by outcome"),
            &["outcome"],
        )
        .expect("valid rejections_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Total delivery status transitions by target phase",
            ),
            &["to"],
        )
        .expect("valid status_transitions_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new(
                "location_updates_total",
                "Total rider location pings by outcome",
            ),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let ws_connections = IntGauge::new(
            "ws_connections",
            "Current number of open websocket connections",
        )
        .expect("valid ws_connections metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(rejections_total.clone()))
            .expect("register rejections_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(ws_connections.clone()))
            .expect("register ws_connections");

        Self {
            registry,
            assignments_total,
            rejections_total,
            status_transitions_total,
            location_updates_total,
            ws_connections,
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
