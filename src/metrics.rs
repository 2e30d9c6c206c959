//! Metric names and descriptions.
//!
//! The engine records through the `metrics` facade only. Installing a
//! recorder (Prometheus exporter or other) is up to the embedding
//! application; without one every call is a no-op.

use crate::channel::ChannelKind;

/// Register all metric descriptions.
///
/// Call once after the application installed its recorder.
pub fn register_metric_descriptions() {
    use metrics::describe_counter;

    describe_counter!(
        "noticer_dispatched_total",
        "Total number of notices delivered by a sink, per channel"
    );
    describe_counter!(
        "noticer_suppressed_total",
        "Total number of dispatches suppressed by a repeat timeout, per channel"
    );
    describe_counter!(
        "noticer_sink_failures_total",
        "Total number of sink failures, per channel and sink"
    );
    describe_counter!(
        "noticer_escalations_total",
        "Total number of sink failures escalated as new notices"
    );
    describe_counter!(
        "noticer_escalation_failures_total",
        "Total number of sink failures dropped while escalating a previous failure"
    );
}

/// Initialize per-channel counters to zero so they are exported from
/// startup, before any notice is sent.
pub fn initialize_metrics() {
    use metrics::counter;

    for kind in ChannelKind::ALL {
        counter!("noticer_dispatched_total", "channel" => kind.as_str()).absolute(0);
        counter!("noticer_suppressed_total", "channel" => kind.as_str()).absolute(0);
    }
    counter!("noticer_escalations_total").absolute(0);
    counter!("noticer_escalation_failures_total").absolute(0);

    tracing::debug!("Metrics initialized to zero");
}
