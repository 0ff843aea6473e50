use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lifecycle_sessions_total",
        "Total number of lifecycle sessions created",
        &["kind"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "lifecycle_sessions_active",
        "Number of sessions currently resident in memory"
    )
    .unwrap();

    pub static ref MOMENTS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lifecycle_moments_submitted_total",
        "Total number of moment submissions",
        &["outcome"]
    )
    .unwrap();

    pub static ref TRIGGERS_APPLIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lifecycle_triggers_applied_total",
        "Total number of trigger events processed",
        &["trigger_type"]
    )
    .unwrap();

    pub static ref MEMBERSHIP_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lifecycle_membership_events_total",
        "Total number of participant join/exit operations",
        &["action"]
    )
    .unwrap();

    pub static ref STORE_RETRIES_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        "lifecycle_store_retries_exhausted_total",
        "Session store writes that failed after exhausting the retry budget"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
