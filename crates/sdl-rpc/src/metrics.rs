//! ---
//! sdl_section: "03-rpc-routing"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "Prometheus counters for routed messages."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use sdl_schema::Interface;

/// Prometheus metric handles for router activity, labelled by peer.
#[derive(Clone)]
pub struct RouterMetrics {
    received: IntCounterVec,
    dispatched: IntCounterVec,
    responded: IntCounterVec,
    rejected: IntCounterVec,
    dropped: IntCounterVec,
    conversion_latency: HistogramVec,
}

impl RouterMetrics {
    /// Register router metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let received = IntCounterVec::new(
            Opts::new("sdl_messages_received_total", "Messages taken off an ingress pipeline"),
            &["peer"],
        )?;
        let dispatched = IntCounterVec::new(
            Opts::new(
                "sdl_messages_dispatched_total",
                "Messages handed to command execution",
            ),
            &["peer"],
        )?;
        let responded = IntCounterVec::new(
            Opts::new(
                "sdl_messages_responded_total",
                "Replies sent straight back to the originating peer",
            ),
            &["peer"],
        )?;
        let rejected = IntCounterVec::new(
            Opts::new(
                "sdl_messages_rejected_total",
                "Messages answered with a negative response",
            ),
            &["peer", "reason"],
        )?;
        let dropped = IntCounterVec::new(
            Opts::new("sdl_messages_dropped_total", "Messages discarded without reply"),
            &["peer", "reason"],
        )?;
        let conversion_latency = HistogramVec::new(
            HistogramOpts::new(
                "sdl_conversion_latency_seconds",
                "Time spent converting and validating one envelope",
            )
            .buckets(vec![0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05]),
            &["peer"],
        )?;

        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(dispatched.clone()))?;
        registry.register(Box::new(responded.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(conversion_latency.clone()))?;

        Ok(Self {
            received,
            dispatched,
            responded,
            rejected,
            dropped,
            conversion_latency,
        })
    }

    /// Count an envelope arriving from `peer`.
    pub fn observe_received(&self, peer: Interface) {
        self.received.with_label_values(&[peer.as_str()]).inc();
    }

    /// Count a message handed to command execution.
    pub fn observe_dispatched(&self, peer: Interface) {
        self.dispatched.with_label_values(&[peer.as_str()]).inc();
    }

    /// Count a reply sent straight back to `peer`.
    pub fn observe_responded(&self, peer: Interface) {
        self.responded.with_label_values(&[peer.as_str()]).inc();
    }

    /// Count a negative response, labelled with its result code.
    pub fn observe_rejected(&self, peer: Interface, reason: &str) {
        self.rejected
            .with_label_values(&[peer.as_str(), reason])
            .inc();
    }

    /// Count a silent drop; `reason` comes from [`DropReason::as_str`](crate::DropReason::as_str).
    pub fn observe_dropped(&self, peer: Interface, reason: &str) {
        self.dropped.with_label_values(&[peer.as_str(), reason]).inc();
    }

    /// Record how long one conversion took.
    pub fn observe_conversion(&self, peer: Interface, elapsed: Duration) {
        self.conversion_latency
            .with_label_values(&[peer.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_labelled_by_peer_and_reason() {
        let registry = Registry::new();
        let metrics = RouterMetrics::register(&registry).expect("register metrics");
        metrics.observe_received(Interface::Mobile);
        metrics.observe_rejected(Interface::Mobile, "schema_violation");
        metrics.observe_dropped(Interface::Hmi, "low_voltage");
        metrics.observe_conversion(Interface::Hmi, Duration::from_micros(80));

        let families = registry.gather();
        let rejected = families
            .iter()
            .find(|family| family.get_name() == "sdl_messages_rejected_total")
            .expect("rejected family");
        let labels: Vec<_> = rejected.get_metric()[0]
            .get_label()
            .iter()
            .map(|pair| (pair.get_name().to_owned(), pair.get_value().to_owned()))
            .collect();
        assert!(labels.contains(&("reason".to_owned(), "schema_violation".to_owned())));
        assert!(labels.contains(&("peer".to_owned(), "mobile".to_owned())));
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Registry::new();
        RouterMetrics::register(&registry).expect("first registration");
        assert!(RouterMetrics::register(&registry).is_err());
    }
}
