/// Round a score to two decimal places.
///
/// Every persisted score in the progress tree goes through this, so aggregate
/// sums stay exact across chapters and the session total.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
