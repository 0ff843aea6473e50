use serde::{Deserialize, Serialize};
use validator::Validate;

use super::event::{EventType, LifecycleEvent};
use super::Session;

/// One event of a moment submission, as sent by the client runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[validate(length(min = 1, message = "verb must be a non-empty string"))]
    pub verb: String,
    pub object: String,
    #[validate(range(min = 0.0, message = "time must be a unix timestamp"))]
    pub time: f64,
    pub event_type: EventType,
}

impl EventPayload {
    pub fn into_event(self, user_id: &str) -> LifecycleEvent {
        LifecycleEvent {
            verb: self.verb,
            object: self.object,
            time: self.time,
            event_type: self.event_type,
            user_id: Some(user_id.to_string()),
            trigger_name: None,
        }
    }
}

/// The authoritative "this moment is finished" payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMomentRequest {
    pub chapter_index: u32,
    pub moment_index: u32,
    #[validate(range(min = 0.0, message = "startTime must be a unix timestamp"))]
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[validate(nested)]
    pub events: Vec<EventPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMomentResponse {
    /// True when a concurrent participant already submitted this moment; the
    /// call was a successful no-op, not an error.
    pub already_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub session: Session,
}

/// Incremental, pre-submission penalty application (live multiplayer feedback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub chapter_index: u32,
    pub moment_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub trigger_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    /// False when the event was only recorded for audit (moment had already
    /// ended) and no score changed.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub session: Session,
}
