use async_trait::async_trait;

use crate::models::Session;

/// Outbound telemetry port (xAPI-style emitter).
///
/// Invoked after a session reaches a terminal state and after each scored
/// moment submission. Implementations must not fail the calling operation;
/// emission problems are theirs to log and swallow.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn moment_submitted(&self, session: &Session, chapter_index: u32, moment_index: u32);
    async fn session_ended(&self, session: &Session);
}

/// Default sink that drops everything.
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn moment_submitted(&self, _session: &Session, _chapter_index: u32, _moment_index: u32) {}

    async fn session_ended(&self, _session: &Session) {}
}
