use chrono::Utc;

/// Current wall-clock time as fractional unix seconds.
///
/// Event and story timestamps are plain unix seconds on the wire; chrono is
/// only used at the edge.
pub fn now_unix() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
